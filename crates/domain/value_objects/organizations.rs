use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::organizations::OrganizationEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentDestinationDto {
    pub organization_id: Uuid,
    pub destination_account: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl PaymentDestinationDto {
    pub fn from_entity(organization: &OrganizationEntity) -> Option<Self> {
        let destination_account = organization.stripe_account_id.clone()?;
        Some(Self {
            organization_id: organization.id,
            destination_account,
            charges_enabled: organization.charges_enabled,
            payouts_enabled: organization.payouts_enabled,
        })
    }
}

/// A bank account attached to an organization's destination, usable as a split recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalAccountDto {
    pub id: String,
    pub bank_name: Option<String>,
    pub last4: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub default_for_currency: bool,
}
