use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::payout_attempts::{InsertPayoutAttemptEntity, PayoutAttemptEntity},
        repositories::{donations::DonationRepository, payout_attempts::PayoutAttemptRepository},
        value_objects::{
            donations::PayoutAttemptDto,
            enums::{
                donation_statuses::DonationStatus, payout_statuses::PayoutStatus,
                recipient_kinds::RecipientKind,
            },
            splits::{SplitShare, SplitSnapshot, allocate_shares},
        },
    },
    payments::{
        errors::StripeApiError,
        stripe_client::{CreatePayoutRequest, CreateTransferRequest},
    },
};
use tracing::{error, info, warn};

use super::{
    errors::{DonationError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

/// Second phase of a split charge: moves each recipient's share out of the holding account.
/// One submission per recipient per invocation; retries come from re-invoking.
pub struct PayoutDistributor<D, P, G>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    donation_repo: Arc<D>,
    payout_repo: Arc<P>,
    stripe: Arc<G>,
}

impl<D, P, G> PayoutDistributor<D, P, G>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(donation_repo: Arc<D>, payout_repo: Arc<P>, stripe: Arc<G>) -> Self {
        Self {
            donation_repo,
            payout_repo,
            stripe,
        }
    }

    pub async fn distribute(&self, charge_reference: &str) -> UseCaseResult<Vec<PayoutAttemptEntity>> {
        let donation = self
            .donation_repo
            .find_by_charge_reference(charge_reference.to_string())
            .await
            .map_err(|err| {
                error!(%charge_reference, db_error = ?err, "payouts: failed to load donation");
                DonationError::Internal(err)
            })?
            .filter(|donation| donation.status == DonationStatus::Succeeded.as_str())
            .ok_or_else(|| DonationError::NotSettled(charge_reference.to_string()))?;

        let payment_intent = self
            .stripe
            .retrieve_payment_intent(charge_reference.to_string())
            .await
            .map_err(|err| {
                warn!(%charge_reference, error = %err, "payouts: could not read charge");
                DonationError::from(err)
            })?;

        let Some(snapshot) = SplitSnapshot::from_metadata(&payment_intent.metadata)? else {
            return Ok(Vec::new());
        };

        let distributable =
            payment_intent.amount - payment_intent.application_fee_amount.unwrap_or_default();
        let amounts = allocate_shares(distributable, &snapshot.shares)?;

        let mut attempts = Vec::with_capacity(snapshot.shares.len());
        for (share, amount) in snapshot.shares.iter().zip(amounts) {
            let pending = InsertPayoutAttemptEntity {
                charge_reference: charge_reference.to_string(),
                split_entry_id: share.split_entry_id,
                recipient_kind: share.kind.to_string(),
                destination: share.destination.clone(),
                amount_minor: amount,
                currency: donation.currency.clone(),
                status: PayoutStatus::Pending.to_string(),
            };

            match self.settle_share(&snapshot, share, pending).await {
                Ok(attempt) => attempts.push(attempt),
                Err(err) => {
                    // Store failures for one recipient must not hold back the others.
                    error!(
                        %charge_reference,
                        destination = %share.destination,
                        db_error = ?err,
                        "payouts: could not record payout attempt"
                    );
                }
            }
        }

        let failed = attempts
            .iter()
            .filter(|attempt| attempt.status != PayoutStatus::Succeeded.as_str())
            .count();
        info!(
            %charge_reference,
            distributable,
            recipients = snapshot.shares.len(),
            failed,
            "payouts: distribution pass finished"
        );

        Ok(attempts)
    }

    async fn settle_share(
        &self,
        snapshot: &SplitSnapshot,
        share: &SplitShare,
        pending: InsertPayoutAttemptEntity,
    ) -> anyhow::Result<PayoutAttemptEntity> {
        let attempt = self.payout_repo.insert_if_absent(pending).await?;

        if attempt.status == PayoutStatus::Succeeded.as_str() {
            return Ok(attempt);
        }

        // Money that would move from the holding account to itself, or nothing at all.
        if share.destination == snapshot.holding_account || attempt.amount_minor == 0 {
            return self.payout_repo.mark_succeeded(attempt.id, None).await;
        }

        match self.submit(snapshot, share, &attempt).await {
            Ok(processor_id) => {
                info!(
                    charge_reference = %attempt.charge_reference,
                    destination = %attempt.destination,
                    amount_minor = attempt.amount_minor,
                    %processor_id,
                    "payouts: share paid"
                );
                self.payout_repo
                    .mark_succeeded(attempt.id, Some(processor_id))
                    .await
            }
            Err(err) => {
                error!(
                    charge_reference = %attempt.charge_reference,
                    destination = %attempt.destination,
                    amount_minor = attempt.amount_minor,
                    attempts = attempt.attempts + 1,
                    transient = err.is_transient(),
                    error = %err,
                    "payouts: share payout failed"
                );
                // A timeout may have gone through; keep the key so a retry cannot pay twice.
                self.payout_repo
                    .mark_failed(attempt.id, err.to_string(), !err.is_transient())
                    .await
            }
        }
    }

    async fn submit(
        &self,
        snapshot: &SplitSnapshot,
        share: &SplitShare,
        attempt: &PayoutAttemptEntity,
    ) -> std::result::Result<String, StripeApiError> {
        let metadata = vec![
            ("charge_reference".to_string(), attempt.charge_reference.clone()),
            ("split_entry_id".to_string(), share.split_entry_id.to_string()),
        ];

        match share.kind {
            RecipientKind::ConnectedAccount => self
                .stripe
                .create_transfer(CreateTransferRequest {
                    source_account: snapshot.holding_account.clone(),
                    destination: share.destination.clone(),
                    amount: attempt.amount_minor,
                    currency: attempt.currency.clone(),
                    transfer_group: attempt.charge_reference.clone(),
                    metadata,
                    idempotency_key: attempt.idempotency_key(),
                })
                .await
                .map(|transfer| transfer.id),
            RecipientKind::BankAccount => self
                .stripe
                .create_payout(CreatePayoutRequest {
                    account: snapshot.holding_account.clone(),
                    destination: share.destination.clone(),
                    amount: attempt.amount_minor,
                    currency: attempt.currency.clone(),
                    metadata,
                    idempotency_key: attempt.idempotency_key(),
                })
                .await
                .map(|payout| payout.id),
        }
    }

    pub async fn list_attempts(&self, charge_reference: &str) -> UseCaseResult<Vec<PayoutAttemptDto>> {
        let attempts = self
            .payout_repo
            .find_by_charge_reference(charge_reference.to_string())
            .await
            .map_err(|err| {
                error!(%charge_reference, db_error = ?err, "payouts: failed to list attempts");
                DonationError::Internal(err)
            })?;

        Ok(attempts.into_iter().map(PayoutAttemptDto::from).collect())
    }

    /// Charges that still owe a recipient: failed attempts, pending ones nobody has touched
    /// since `stale_before`, and settled split charges whose first distribution never got as
    /// far as writing an attempt.
    pub async fn redrivable_charges(
        &self,
        max_attempts: i32,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> UseCaseResult<Vec<String>> {
        let mut charge_references = self
            .payout_repo
            .list_redrivable_charge_references(max_attempts, stale_before, limit)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "payouts: failed to list redrivable charges");
                DonationError::Internal(err)
            })?;

        let remaining = limit - charge_references.len() as i64;
        if remaining <= 0 {
            return Ok(charge_references);
        }

        let undistributed = self
            .donation_repo
            .list_undistributed_charge_references(stale_before, remaining)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "payouts: failed to list undistributed charges");
                DonationError::Internal(err)
            })?;
        if !undistributed.is_empty() {
            warn!(
                count = undistributed.len(),
                "payouts: settled split charges found with no payout attempts"
            );
        }

        for charge_reference in undistributed {
            if !charge_references.contains(&charge_reference) {
                charge_references.push(charge_reference);
            }
        }

        Ok(charge_references)
    }
}
