//! In-memory stand-ins for the Postgres repositories, enforcing the same uniqueness rules.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            donations::{DonationEntity, InsertDonationEntity},
            organizations::{OrganizationEntity, UpdatePaymentDestinationEntity},
            payout_attempts::{InsertPayoutAttemptEntity, PayoutAttemptEntity},
        },
        repositories::{
            donations::DonationRepository, organizations::OrganizationRepository,
            payout_attempts::PayoutAttemptRepository,
        },
        value_objects::{
            donations::{RecordedDonation, metadata_keys},
            enums::payout_statuses::PayoutStatus,
        },
    },
    payments::{errors::StripeApiError, stripe_client::StripePaymentIntent},
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct InMemoryDonations {
    rows: Mutex<HashMap<String, DonationEntity>>,
    /// Stands in for the payout_attempts table the Postgres query anti-joins against.
    payouts: Option<Arc<InMemoryPayoutAttempts>>,
}

impl InMemoryDonations {
    pub(crate) fn with_payouts(payouts: Arc<InMemoryPayoutAttempts>) -> Self {
        Self {
            rows: Mutex::default(),
            payouts: Some(payouts),
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl DonationRepository for InMemoryDonations {
    async fn insert_if_absent(&self, donation: InsertDonationEntity) -> Result<RecordedDonation> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.get(&donation.charge_reference) {
            return Ok(RecordedDonation {
                donation: existing.clone(),
                created: false,
            });
        }

        let now = Utc::now();
        let row = DonationEntity {
            id: Uuid::new_v4(),
            charge_reference: donation.charge_reference.clone(),
            amount_minor: donation.amount_minor,
            charged_amount_minor: donation.charged_amount_minor,
            currency: donation.currency,
            donor_email: donation.donor_email,
            donor_name: donation.donor_name,
            organization_id: donation.organization_id,
            campaign_id: donation.campaign_id,
            status: donation.status,
            receipt_token: donation.receipt_token,
            anonymous: donation.anonymous,
            frequency: donation.frequency,
            fee_coverage: donation.fee_coverage,
            metadata: donation.metadata,
            split_share_count: donation.split_share_count,
            created_at: now,
            updated_at: now,
        };
        rows.insert(donation.charge_reference, row.clone());
        Ok(RecordedDonation {
            donation: row,
            created: true,
        })
    }

    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Option<DonationEntity>> {
        Ok(self.rows.lock().await.get(&charge_reference).cloned())
    }

    async fn list_undistributed_charge_references(
        &self,
        settled_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let distributed: Vec<String> = match &self.payouts {
            Some(payouts) => payouts
                .all()
                .await
                .into_iter()
                .map(|attempt| attempt.charge_reference)
                .collect(),
            None => Vec::new(),
        };

        let rows = self.rows.lock().await;
        let mut undistributed: Vec<&DonationEntity> = rows
            .values()
            .filter(|row| row.split_share_count > 0 && row.updated_at < settled_before)
            .filter(|row| !distributed.contains(&row.charge_reference))
            .collect();
        undistributed.sort_by_key(|row| row.created_at);

        Ok(undistributed
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|row| row.charge_reference.clone())
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryPayoutAttempts {
    rows: Mutex<Vec<PayoutAttemptEntity>>,
}

impl InMemoryPayoutAttempts {
    pub(crate) async fn all(&self) -> Vec<PayoutAttemptEntity> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl PayoutAttemptRepository for InMemoryPayoutAttempts {
    async fn find_by_charge_reference(
        &self,
        charge_reference: String,
    ) -> Result<Vec<PayoutAttemptEntity>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.charge_reference == charge_reference)
            .cloned()
            .collect())
    }

    async fn insert_if_absent(
        &self,
        attempt: InsertPayoutAttemptEntity,
    ) -> Result<PayoutAttemptEntity> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.iter().find(|row| {
            row.charge_reference == attempt.charge_reference
                && row.destination == attempt.destination
        }) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let row = PayoutAttemptEntity {
            id: Uuid::new_v4(),
            charge_reference: attempt.charge_reference,
            split_entry_id: attempt.split_entry_id,
            recipient_kind: attempt.recipient_kind,
            destination: attempt.destination,
            amount_minor: attempt.amount_minor,
            currency: attempt.currency,
            status: attempt.status,
            processor_payout_id: None,
            error: None,
            attempts: 0,
            key_generation: 0,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn mark_succeeded(
        &self,
        attempt_id: Uuid,
        processor_payout_id: Option<String>,
    ) -> Result<PayoutAttemptEntity> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == attempt_id)
            .ok_or_else(|| anyhow!("no attempt {attempt_id}"))?;
        if row.status != PayoutStatus::Succeeded.as_str() {
            row.status = PayoutStatus::Succeeded.to_string();
            row.processor_payout_id = processor_payout_id;
            row.error = None;
            row.attempts += 1;
            row.updated_at = Utc::now();
        }
        Ok(row.clone())
    }

    async fn mark_failed(
        &self,
        attempt_id: Uuid,
        error: String,
        rejected: bool,
    ) -> Result<PayoutAttemptEntity> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == attempt_id)
            .ok_or_else(|| anyhow!("no attempt {attempt_id}"))?;
        if row.status != PayoutStatus::Succeeded.as_str() {
            row.status = PayoutStatus::Failed.to_string();
            row.error = Some(error);
            row.attempts += 1;
            if rejected {
                row.key_generation += 1;
            }
            row.updated_at = Utc::now();
        }
        Ok(row.clone())
    }

    async fn list_redrivable_charge_references(
        &self,
        max_attempts: i32,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows = self.rows.lock().await;
        let mut references: Vec<String> = Vec::new();
        for row in rows.iter() {
            let failed = row.status == PayoutStatus::Failed.as_str();
            let stale =
                row.status == PayoutStatus::Pending.as_str() && row.updated_at < stale_before;
            if (failed || stale)
                && row.attempts < max_attempts
                && !references.contains(&row.charge_reference)
            {
                references.push(row.charge_reference.clone());
            }
        }
        references.truncate(limit.max(0) as usize);
        Ok(references)
    }
}

#[derive(Default)]
pub(crate) struct InMemoryOrganizations {
    rows: Mutex<HashMap<Uuid, OrganizationEntity>>,
}

impl InMemoryOrganizations {
    pub(crate) async fn insert(&self, organization: OrganizationEntity) {
        self.rows.lock().await.insert(organization.id, organization);
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizations {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<OrganizationEntity>> {
        Ok(self.rows.lock().await.get(&organization_id).cloned())
    }

    async fn find_by_ids(&self, organization_ids: Vec<Uuid>) -> Result<Vec<OrganizationEntity>> {
        let rows = self.rows.lock().await;
        Ok(organization_ids
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn update_payment_destination(
        &self,
        organization_id: Uuid,
        destination: UpdatePaymentDestinationEntity,
    ) -> Result<OrganizationEntity> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&organization_id)
            .ok_or_else(|| anyhow!("no organization {organization_id}"))?;
        row.stripe_account_id = destination.stripe_account_id;
        row.charges_enabled = destination.charges_enabled;
        row.payouts_enabled = destination.payouts_enabled;
        row.updated_at = destination.updated_at;
        Ok(row.clone())
    }
}

pub(crate) fn organization(stripe_account_id: Option<&str>, charges_enabled: bool) -> OrganizationEntity {
    let now = Utc::now();
    OrganizationEntity {
        id: Uuid::new_v4(),
        name: "Riverside Food Bank".to_string(),
        stripe_account_id: stripe_account_id.map(str::to_string),
        charges_enabled,
        payouts_enabled: charges_enabled,
        created_at: now,
        updated_at: now,
    }
}

/// A succeeded payment intent as created by the charge initiator.
pub(crate) fn settled_intent(
    id: &str,
    organization_id: Uuid,
    amount: i64,
    application_fee: i64,
    extra_metadata: Vec<(String, String)>,
) -> StripePaymentIntent {
    let mut metadata: HashMap<String, String> = HashMap::from([
        (metadata_keys::ORGANIZATION_ID.to_string(), organization_id.to_string()),
        (metadata_keys::DONATION_AMOUNT_MINOR.to_string(), amount.to_string()),
        (metadata_keys::FEE_COVERAGE.to_string(), "organization_covers_fees".to_string()),
        (metadata_keys::FREQUENCY.to_string(), "one_time".to_string()),
        (metadata_keys::ANONYMOUS.to_string(), "false".to_string()),
        (metadata_keys::DONOR_EMAIL.to_string(), "donor@example.org".to_string()),
        (metadata_keys::DONOR_NAME.to_string(), "Dana Donor".to_string()),
    ]);
    metadata.extend(extra_metadata);

    StripePaymentIntent {
        id: id.to_string(),
        amount,
        currency: "usd".to_string(),
        status: "succeeded".to_string(),
        client_secret: Some(format!("{id}_secret")),
        application_fee_amount: Some(application_fee),
        metadata,
        transfer_data: None,
        latest_charge: None,
        last_payment_error: None,
        created: None,
    }
}

pub(crate) fn rejected(context: &str, message: &str) -> StripeApiError {
    StripeApiError::Rejected {
        context: context.to_string(),
        status: 400,
        code: None,
        message: message.to_string(),
    }
}

pub(crate) fn timed_out(context: &str) -> StripeApiError {
    StripeApiError::Transient {
        context: context.to_string(),
        message: "request timed out".to_string(),
    }
}
