use std::{collections::HashMap, sync::Arc};

use crates::{
    domain::{
        entities::donations::InsertDonationEntity,
        repositories::donations::DonationRepository,
        value_objects::{
            donations::{RecordedDonation, metadata_keys, new_receipt_token},
            splits::SplitSnapshot,
            enums::{
                donation_frequencies::DonationFrequency, donation_statuses::DonationStatus,
                fee_coverage_policies::FeeCoveragePolicy,
            },
        },
    },
    payments::stripe_client::StripePaymentIntent,
};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    errors::{DonationError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Settled(RecordedDonation),
    /// The charge exists but has not succeeded yet; poll again.
    Pending,
    /// The processor declined or canceled the charge. Never retried automatically.
    Failed,
}

/// Writes exactly one donation per settled charge, whichever trigger gets there first.
pub struct SettlementRecorder<D, G>
where
    D: DonationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    donation_repo: Arc<D>,
    stripe: Arc<G>,
}

impl<D, G> SettlementRecorder<D, G>
where
    D: DonationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(donation_repo: Arc<D>, stripe: Arc<G>) -> Self {
        Self {
            donation_repo,
            stripe,
        }
    }

    /// Records a charge the processor reports as succeeded. Losing the insert race is not an
    /// error: the winner's row comes back with `created == false`.
    pub async fn record_settled(
        &self,
        payment_intent: &StripePaymentIntent,
    ) -> UseCaseResult<RecordedDonation> {
        let charge_reference = payment_intent.id.as_str();
        if !payment_intent.is_succeeded() {
            return Err(DonationError::NotSettled(charge_reference.to_string()));
        }

        let donation = donation_from_payment_intent(payment_intent)?;
        let recorded = self
            .donation_repo
            .insert_if_absent(donation)
            .await
            .map_err(|err| {
                error!(
                    %charge_reference,
                    db_error = ?err,
                    "settlement: failed to record donation"
                );
                DonationError::Internal(err)
            })?;

        if recorded.created {
            info!(
                %charge_reference,
                donation_id = %recorded.donation.id,
                amount_minor = recorded.donation.amount_minor,
                "settlement: donation recorded"
            );
        } else {
            debug!(
                %charge_reference,
                donation_id = %recorded.donation.id,
                "settlement: donation already recorded"
            );
        }

        Ok(recorded)
    }

    /// The synchronous path: answer from the ledger, otherwise ask the processor and record
    /// the donation ourselves if the charge has already succeeded.
    pub async fn resolve_now(&self, charge_reference: &str) -> UseCaseResult<SettlementOutcome> {
        let existing = self
            .donation_repo
            .find_by_charge_reference(charge_reference.to_string())
            .await
            .map_err(|err| {
                error!(
                    %charge_reference,
                    db_error = ?err,
                    "settlement: failed to look up donation"
                );
                DonationError::Internal(err)
            })?;

        // Only settled charges are ever recorded, so a row is the answer.
        if let Some(donation) = existing {
            return Ok(SettlementOutcome::Settled(RecordedDonation {
                donation,
                created: false,
            }));
        }

        let payment_intent = self
            .stripe
            .retrieve_payment_intent(charge_reference.to_string())
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    return DonationError::NotFound(format!("charge {charge_reference}"));
                }
                warn!(
                    %charge_reference,
                    error = %err,
                    "settlement: could not read charge status"
                );
                DonationError::from(err)
            })?;

        if payment_intent.is_succeeded() {
            return Ok(SettlementOutcome::Settled(
                self.record_settled(&payment_intent).await?,
            ));
        }
        if payment_intent.is_failed() {
            info!(
                %charge_reference,
                status = %payment_intent.status,
                "settlement: charge failed at the processor"
            );
            return Ok(SettlementOutcome::Failed);
        }

        debug!(
            %charge_reference,
            status = %payment_intent.status,
            "settlement: charge not settled yet"
        );
        Ok(SettlementOutcome::Pending)
    }
}

/// Rebuilds the ledger row from the metadata the charge initiator wrote onto the charge.
fn donation_from_payment_intent(
    payment_intent: &StripePaymentIntent,
) -> UseCaseResult<InsertDonationEntity> {
    let metadata = &payment_intent.metadata;
    let charge_reference = payment_intent.id.clone();
    let foreign = || {
        DonationError::Validation(format!(
            "charge {charge_reference} was not created by the donation flow"
        ))
    };

    let organization_id = metadata
        .get(metadata_keys::ORGANIZATION_ID)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(foreign)?;
    let amount_minor = metadata
        .get(metadata_keys::DONATION_AMOUNT_MINOR)
        .and_then(|value| value.parse::<i64>().ok())
        .ok_or_else(foreign)?;
    let donor_email = metadata
        .get(metadata_keys::DONOR_EMAIL)
        .cloned()
        .ok_or_else(foreign)?;

    let fee_coverage = metadata
        .get(metadata_keys::FEE_COVERAGE)
        .and_then(|value| FeeCoveragePolicy::from_str(value))
        .unwrap_or_default();
    let frequency = metadata
        .get(metadata_keys::FREQUENCY)
        .and_then(|value| DonationFrequency::from_str(value))
        .unwrap_or_default();

    // Recorded with the row so a charge still owing payouts stays visible to the re-drive
    // worker even if no payout attempt was ever written.
    let split_share_count = match SplitSnapshot::from_metadata(metadata) {
        Ok(snapshot) => snapshot.map_or(0, |snapshot| snapshot.shares.len() as i32),
        Err(err) => {
            warn!(%charge_reference, error = %err, "settlement: unreadable split snapshot");
            0
        }
    };

    Ok(InsertDonationEntity {
        charge_reference: charge_reference.clone(),
        amount_minor,
        charged_amount_minor: payment_intent.amount,
        currency: payment_intent.currency.to_ascii_lowercase(),
        donor_email,
        donor_name: metadata.get(metadata_keys::DONOR_NAME).cloned(),
        organization_id,
        campaign_id: metadata
            .get(metadata_keys::CAMPAIGN_ID)
            .and_then(|value| Uuid::parse_str(value).ok()),
        status: DonationStatus::Succeeded.to_string(),
        receipt_token: new_receipt_token(),
        anonymous: flag(metadata, metadata_keys::ANONYMOUS),
        frequency: frequency.to_string(),
        fee_coverage: fee_coverage.to_string(),
        metadata: json!({
            "application_fee_minor": payment_intent.application_fee_amount,
            "destination_account": payment_intent.destination(),
            "charge_metadata": metadata,
        }),
        split_share_count,
    })
}

fn flag(metadata: &HashMap<String, String>, key: &str) -> bool {
    metadata
        .get(key)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        stripe_gateway::MockStripeGateway,
        test_support::{InMemoryDonations, settled_intent},
    };
    use crates::{
        domain::repositories::donations::MockDonationRepository,
        payments::errors::StripeApiError,
    };

    #[tokio::test]
    async fn webhook_and_poll_race_yields_one_donation() {
        let organization_id = Uuid::new_v4();
        let intent = settled_intent("ch_abc", organization_id, 5_000, 50, vec![]);

        let mut stripe = MockStripeGateway::new();
        let polled = intent.clone();
        stripe
            .expect_retrieve_payment_intent()
            .returning(move |_| Ok(polled.clone()));

        let donations = Arc::new(InMemoryDonations::default());
        let recorder = Arc::new(SettlementRecorder::new(
            Arc::clone(&donations),
            Arc::new(stripe),
        ));

        let webhook = {
            let recorder = Arc::clone(&recorder);
            let intent = intent.clone();
            tokio::spawn(async move { recorder.record_settled(&intent).await })
        };
        let poll = {
            let recorder = Arc::clone(&recorder);
            tokio::spawn(async move { recorder.resolve_now("ch_abc").await })
        };

        let from_webhook = webhook.await.unwrap().unwrap();
        let SettlementOutcome::Settled(from_poll) = poll.await.unwrap().unwrap() else {
            panic!("poll should observe a settled charge");
        };

        assert_eq!(donations.len().await, 1);
        assert_eq!(from_webhook.donation.id, from_poll.donation.id);
        assert_eq!(
            from_webhook.donation.receipt_token,
            from_poll.donation.receipt_token
        );
        assert!(from_webhook.created ^ from_poll.created);
    }

    #[tokio::test]
    async fn replayed_notification_is_a_no_op() {
        let intent = settled_intent("pi_replay", Uuid::new_v4(), 2_500, 25, vec![]);
        let donations = Arc::new(InMemoryDonations::default());
        let recorder = SettlementRecorder::new(
            Arc::clone(&donations),
            Arc::new(MockStripeGateway::new()),
        );

        let first = recorder.record_settled(&intent).await.unwrap();
        let second = recorder.record_settled(&intent).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.donation, second.donation);
        assert_eq!(donations.len().await, 1);
    }

    #[tokio::test]
    async fn recorded_amount_is_the_intended_donation() {
        let organization_id = Uuid::new_v4();
        let intent = settled_intent(
            "pi_gross",
            organization_id,
            5_235,
            52,
            vec![
                (metadata_keys::DONATION_AMOUNT_MINOR.to_string(), "5000".to_string()),
                (metadata_keys::FEE_COVERAGE.to_string(), "payer_covers_fees".to_string()),
            ],
        );
        let recorder = SettlementRecorder::new(
            Arc::new(InMemoryDonations::default()),
            Arc::new(MockStripeGateway::new()),
        );

        let recorded = recorder.record_settled(&intent).await.unwrap();

        assert_eq!(recorded.donation.amount_minor, 5_000);
        assert_eq!(recorded.donation.charged_amount_minor, 5_235);
        assert_eq!(recorded.donation.organization_id, organization_id);
        assert_eq!(recorded.donation.fee_coverage, "payer_covers_fees");
        assert_eq!(recorded.donation.status, "succeeded");
    }

    #[tokio::test]
    async fn split_share_count_is_recorded_with_the_donation() {
        use crates::domain::value_objects::{
            enums::{recipient_kinds::RecipientKind, split_sources::SplitSourceKind},
            splits::{SplitConfiguration, SplitShare},
        };

        let split = SplitConfiguration::new(
            SplitSourceKind::Card,
            ["acct_a", "acct_b"]
                .into_iter()
                .map(|destination| SplitShare {
                    split_entry_id: Uuid::new_v4(),
                    kind: RecipientKind::ConnectedAccount,
                    destination: destination.to_string(),
                    percentage_bps: 5_000,
                })
                .collect(),
        )
        .unwrap()
        .snapshot("acct_holding")
        .to_metadata();

        let recorder = SettlementRecorder::new(
            Arc::new(InMemoryDonations::default()),
            Arc::new(MockStripeGateway::new()),
        );
        let split_charge = settled_intent("pi_shared", Uuid::new_v4(), 4_000, 40, split);
        let plain_charge = settled_intent("pi_single", Uuid::new_v4(), 4_000, 40, vec![]);

        let shared = recorder.record_settled(&split_charge).await.unwrap();
        let single = recorder.record_settled(&plain_charge).await.unwrap();

        assert_eq!(shared.donation.split_share_count, 2);
        assert_eq!(single.donation.split_share_count, 0);
    }

    #[tokio::test]
    async fn unsettled_charges_are_never_recorded() {
        let mut processing = settled_intent("pi_wait", Uuid::new_v4(), 1_000, 10, vec![]);
        processing.status = "processing".to_string();
        let mut canceled = processing.clone();
        canceled.id = "pi_gone".to_string();
        canceled.status = "canceled".to_string();

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_payment_intent()
            .returning(move |id| {
                if id == "pi_wait" {
                    Ok(processing.clone())
                } else {
                    Ok(canceled.clone())
                }
            });

        let mut donation_repo = MockDonationRepository::new();
        donation_repo
            .expect_find_by_charge_reference()
            .returning(|_| Box::pin(async { Ok(None) }));
        donation_repo.expect_insert_if_absent().times(0);

        let recorder = SettlementRecorder::new(Arc::new(donation_repo), Arc::new(stripe));

        assert_eq!(
            recorder.resolve_now("pi_wait").await.unwrap(),
            SettlementOutcome::Pending
        );
        assert_eq!(
            recorder.resolve_now("pi_gone").await.unwrap(),
            SettlementOutcome::Failed
        );
    }

    #[tokio::test]
    async fn unknown_charge_is_not_found_and_timeouts_stay_transient() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_payment_intent()
            .returning(|id| {
                if id == "pi_missing" {
                    Err(StripeApiError::Rejected {
                        context: "retrieve payment intent".to_string(),
                        status: 404,
                        code: Some("resource_missing".to_string()),
                        message: "No such payment_intent".to_string(),
                    })
                } else {
                    Err(StripeApiError::Transient {
                        context: "retrieve payment intent".to_string(),
                        message: "request timed out".to_string(),
                    })
                }
            });

        let recorder = SettlementRecorder::new(
            Arc::new(InMemoryDonations::default()),
            Arc::new(stripe),
        );

        assert!(matches!(
            recorder.resolve_now("pi_missing").await,
            Err(DonationError::NotFound(_))
        ));
        assert!(matches!(
            recorder.resolve_now("pi_slow").await,
            Err(DonationError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn foreign_charges_are_rejected_as_validation() {
        let mut intent = settled_intent("pi_other", Uuid::new_v4(), 1_000, 0, vec![]);
        intent.metadata.clear();
        let recorder = SettlementRecorder::new(
            Arc::new(InMemoryDonations::default()),
            Arc::new(MockStripeGateway::new()),
        );

        assert!(matches!(
            recorder.record_settled(&intent).await,
            Err(DonationError::Validation(_))
        ));
    }
}
