use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::organizations;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = organizations)]
pub struct OrganizationEntity {
    pub id: Uuid,
    pub name: String,
    pub stripe_account_id: Option<String>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationEntity {
    /// The connected account a charge or transfer may target, if it can receive funds.
    pub fn active_destination(&self) -> Option<&str> {
        match self.stripe_account_id.as_deref() {
            Some(account) if self.charges_enabled && !account.is_empty() => Some(account),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = organizations)]
pub struct UpdatePaymentDestinationEntity {
    pub stripe_account_id: Option<String>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub updated_at: DateTime<Utc>,
}
