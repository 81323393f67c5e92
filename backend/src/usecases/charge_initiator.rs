use std::sync::Arc;

use anyhow::anyhow;
use crates::{
    domain::{
        repositories::organizations::OrganizationRepository,
        value_objects::{
            donations::{ChargeHandle, DonationIntent, metadata_keys},
            fees::FeeModel,
            splits::SplitConfiguration,
        },
    },
    payments::stripe_client::CreatePaymentIntentRequest,
};
use tracing::{error, info, warn};

use super::{
    errors::{DonationError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

/// Creates the processor-side charge. Split charges land on the organization's own
/// destination as the holding account; shares move later, once the charge settles.
pub struct ChargeInitiator<O, G>
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    organization_repo: Arc<O>,
    stripe: Arc<G>,
    fee_model: FeeModel,
}

impl<O, G> ChargeInitiator<O, G>
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(organization_repo: Arc<O>, stripe: Arc<G>, fee_model: FeeModel) -> Self {
        Self {
            organization_repo,
            stripe,
            fee_model,
        }
    }

    pub async fn initiate(
        &self,
        intent: &DonationIntent,
        charge_amount: i64,
        splits: Option<&SplitConfiguration>,
        idempotency_key: String,
    ) -> UseCaseResult<ChargeHandle> {
        let organization_id = intent.organization_id;
        let organization = self
            .organization_repo
            .find_by_id(organization_id)
            .await
            .map_err(|err| {
                error!(%organization_id, db_error = ?err, "charges: failed to load organization");
                DonationError::Internal(err)
            })?
            .ok_or_else(|| DonationError::NotFound(format!("organization {organization_id}")))?;

        let destination = organization
            .active_destination()
            .ok_or_else(|| {
                warn!(%organization_id, "charges: organization cannot accept payments");
                DonationError::Validation(
                    "this organization is not set up to accept donations yet".to_string(),
                )
            })?
            .to_string();

        let application_fee = self.fee_model.platform_fee(charge_amount);
        let metadata = charge_metadata(intent, splits, &destination);

        let request = CreatePaymentIntentRequest {
            amount: charge_amount,
            currency: intent.normalized_currency(),
            destination: destination.clone(),
            application_fee_amount: application_fee,
            metadata,
            receipt_email: Some(intent.donor.email.trim().to_string()),
            description: Some(format!("Donation to {}", organization.name)),
            idempotency_key: idempotency_key.clone(),
        };

        let payment_intent = self
            .stripe
            .create_payment_intent(request)
            .await
            .map_err(|err| {
                if err.is_transient() {
                    warn!(
                        %organization_id,
                        %idempotency_key,
                        error = %err,
                        "charges: charge outcome unknown, caller should retry with the same key"
                    );
                } else {
                    error!(
                        %organization_id,
                        %idempotency_key,
                        error = %err,
                        "charges: processor refused charge"
                    );
                }
                DonationError::from(err)
            })?;

        let client_secret = payment_intent.client_secret.clone().ok_or_else(|| {
            error!(
                charge_reference = %payment_intent.id,
                "charges: processor returned a charge without a client secret"
            );
            DonationError::Internal(anyhow!("charge {} has no client secret", payment_intent.id))
        })?;

        info!(
            %organization_id,
            charge_reference = %payment_intent.id,
            charge_amount,
            application_fee,
            split = splits.is_some(),
            "charges: charge created"
        );

        Ok(ChargeHandle {
            client_secret,
            charge_id: payment_intent.id,
            destination_account: destination,
            donation_amount_minor: intent.amount_minor,
            charged_amount_minor: charge_amount,
            application_fee_minor: application_fee,
            split_active: splits.is_some(),
            idempotency_key,
        })
    }
}

/// Everything settlement needs to rebuild the donation without the original request.
fn charge_metadata(
    intent: &DonationIntent,
    splits: Option<&SplitConfiguration>,
    holding_account: &str,
) -> Vec<(String, String)> {
    let mut metadata = vec![
        (
            metadata_keys::ORGANIZATION_ID.to_string(),
            intent.organization_id.to_string(),
        ),
        (
            metadata_keys::DONATION_AMOUNT_MINOR.to_string(),
            intent.amount_minor.to_string(),
        ),
        (
            metadata_keys::FEE_COVERAGE.to_string(),
            intent.fee_coverage.to_string(),
        ),
        (
            metadata_keys::FREQUENCY.to_string(),
            intent.frequency.to_string(),
        ),
        (
            metadata_keys::ANONYMOUS.to_string(),
            intent.anonymous.to_string(),
        ),
        (
            metadata_keys::DONOR_EMAIL.to_string(),
            intent.donor.email.trim().to_string(),
        ),
    ];

    if let Some(name) = intent.donor.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        metadata.push((metadata_keys::DONOR_NAME.to_string(), name.to_string()));
    }
    if let Some(campaign_id) = intent.campaign_id {
        metadata.push((
            metadata_keys::CAMPAIGN_ID.to_string(),
            campaign_id.to_string(),
        ));
    }
    if let Some(key) = intent.idempotency_key.as_deref() {
        metadata.push((metadata_keys::IDEMPOTENCY_KEY.to_string(), key.to_string()));
    }
    if let Some(splits) = splits {
        metadata.extend(splits.snapshot(holding_account).to_metadata());
    }

    metadata
}
