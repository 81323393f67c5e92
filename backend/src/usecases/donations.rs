use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            donations::DonationRepository, organizations::OrganizationRepository,
            payout_attempts::PayoutAttemptRepository,
            split_configurations::SplitConfigurationRepository,
        },
        value_objects::{
            donations::{ChargeHandle, DonationIntent, ReceiptDto},
            fees::FeeModel,
            splits::SPLIT_COUNT_KEY,
        },
    },
    payments::stripe_client::{StripeClient, StripePaymentIntent},
};
use tracing::{debug, error, info, warn};

use super::{
    charge_initiator::ChargeInitiator,
    errors::{DonationError, UseCaseResult},
    payout_distributor::PayoutDistributor,
    settlement_recorder::{SettlementOutcome, SettlementRecorder},
    split_resolver::SplitResolver,
    stripe_gateway::StripeGateway,
};

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptStatus {
    Settled(ReceiptDto),
    Pending,
}

/// Entry point for the donor-facing flow: charge creation, receipt polling and the
/// processor's settlement notifications.
pub struct DonationUseCase<D, P, O, S, G>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    S: SplitConfigurationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    fee_model: FeeModel,
    idempotency_bucket_seconds: i64,
    split_resolver: SplitResolver<S, O, G>,
    charge_initiator: ChargeInitiator<O, G>,
    settlement: SettlementRecorder<D, G>,
    distributor: Arc<PayoutDistributor<D, P, G>>,
    stripe: Arc<G>,
}

impl<D, P, O, S, G> DonationUseCase<D, P, O, S, G>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    S: SplitConfigurationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        donation_repo: Arc<D>,
        payout_repo: Arc<P>,
        organization_repo: Arc<O>,
        split_repo: Arc<S>,
        stripe: Arc<G>,
        fee_model: FeeModel,
        idempotency_bucket_seconds: i64,
    ) -> Self {
        Self {
            fee_model,
            idempotency_bucket_seconds,
            split_resolver: SplitResolver::new(
                split_repo,
                Arc::clone(&organization_repo),
                Arc::clone(&stripe),
            ),
            charge_initiator: ChargeInitiator::new(
                organization_repo,
                Arc::clone(&stripe),
                fee_model,
            ),
            settlement: SettlementRecorder::new(Arc::clone(&donation_repo), Arc::clone(&stripe)),
            distributor: Arc::new(PayoutDistributor::new(
                donation_repo,
                payout_repo,
                Arc::clone(&stripe),
            )),
            stripe,
        }
    }

    /// Everything that can be rejected is checked before the processor is called.
    pub async fn create_intent(&self, intent: DonationIntent) -> UseCaseResult<ChargeHandle> {
        intent.validate().map_err(DonationError::Validation)?;

        let charge_amount = self
            .fee_model
            .charge_amount(intent.amount_minor, intent.fee_coverage)?;

        let splits = self
            .split_resolver
            .resolve(intent.organization_id, &intent.split_source)
            .await?;

        let idempotency_key = intent.idempotency_key(
            charge_amount,
            splits.as_ref(),
            Utc::now(),
            self.idempotency_bucket_seconds,
        );

        self.charge_initiator
            .initiate(&intent, charge_amount, splits.as_ref(), idempotency_key)
            .await
    }

    pub async fn get_receipt(&self, charge_reference: &str) -> UseCaseResult<ReceiptStatus> {
        match self.settlement.resolve_now(charge_reference).await? {
            SettlementOutcome::Settled(recorded) => {
                if recorded.created {
                    // The poll beat the notification; distribution is ours to start.
                    self.schedule_distribution(charge_reference.to_string());
                }
                Ok(ReceiptStatus::Settled(ReceiptDto::from(recorded.donation)))
            }
            SettlementOutcome::Pending => Ok(ReceiptStatus::Pending),
            SettlementOutcome::Failed => Err(DonationError::ProcessorRejection(
                "the payment was declined or canceled".to_string(),
            )),
        }
    }

    /// Verifies and applies one processor notification. `Ok` means the event was accepted and
    /// must not be redelivered; an `Err` other than a bad signature asks for redelivery.
    pub async fn handle_stripe_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .stripe
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "webhooks: rejected notification");
                DonationError::from(err)
            })?;

        if event.type_ != PAYMENT_INTENT_SUCCEEDED {
            debug!(event_type = %event.type_, "webhooks: ignoring event");
            return Ok(());
        }

        let Some(payment_intent) = StripeClient::extract_payment_intent(&event) else {
            error!(
                event_id = ?event.id,
                "webhooks: succeeded event without a readable payment intent"
            );
            return Ok(());
        };

        match self.settlement.record_settled(&payment_intent).await {
            Ok(recorded) => {
                info!(
                    charge_reference = %payment_intent.id,
                    donation_id = %recorded.donation.id,
                    created = recorded.created,
                    "webhooks: settlement applied"
                );
                // Redeliveries re-run distribution too; succeeded shares are skipped.
                if has_split_snapshot(&payment_intent) {
                    self.schedule_distribution(payment_intent.id.clone());
                }
                Ok(())
            }
            Err(DonationError::Validation(reason)) => {
                warn!(
                    charge_reference = %payment_intent.id,
                    %reason,
                    "webhooks: charge was not created by this service"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn schedule_distribution(&self, charge_reference: String) {
        let distributor = Arc::clone(&self.distributor);
        tokio::spawn(async move {
            match distributor.distribute(&charge_reference).await {
                Ok(_) => {}
                Err(err) => error!(
                    %charge_reference,
                    error = %err,
                    "payouts: distribution could not start; left for re-drive"
                ),
            }
        });
    }
}

fn has_split_snapshot(payment_intent: &StripePaymentIntent) -> bool {
    payment_intent.metadata.contains_key(SPLIT_COUNT_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        stripe_gateway::MockStripeGateway,
        test_support::{
            InMemoryDonations, InMemoryOrganizations, InMemoryPayoutAttempts, organization,
            settled_intent,
        },
    };
    use crates::{
        domain::{
            entities::split_entries::SplitEntryEntity,
            repositories::split_configurations::MockSplitConfigurationRepository,
            value_objects::{
                donations::{DonorContact, SplitSourceRef, metadata_keys},
                enums::{
                    donation_frequencies::DonationFrequency,
                    fee_coverage_policies::FeeCoveragePolicy, split_sources::SplitSourceKind,
                },
            },
        },
        payments::{
            errors::StripeApiError,
            stripe_client::{StripeEvent, StripeEventData},
        },
    };
    use uuid::Uuid;

    type TestUseCase = DonationUseCase<
        InMemoryDonations,
        InMemoryPayoutAttempts,
        InMemoryOrganizations,
        MockSplitConfigurationRepository,
        MockStripeGateway,
    >;

    fn use_case(
        donations: Arc<InMemoryDonations>,
        organizations: Arc<InMemoryOrganizations>,
        split_repo: MockSplitConfigurationRepository,
        stripe: MockStripeGateway,
    ) -> TestUseCase {
        DonationUseCase::new(
            donations,
            Arc::new(InMemoryPayoutAttempts::default()),
            organizations,
            Arc::new(split_repo),
            Arc::new(stripe),
            FeeModel::default(),
            600,
        )
    }

    fn no_splits() -> MockSplitConfigurationRepository {
        let mut repo = MockSplitConfigurationRepository::new();
        repo.expect_find_entries()
            .returning(|_, _| Box::pin(async { Ok(Vec::new()) }));
        repo
    }

    fn intent(organization_id: Uuid) -> DonationIntent {
        DonationIntent {
            amount_minor: 5_000,
            currency: "usd".to_string(),
            donor: DonorContact {
                email: "donor@example.org".to_string(),
                name: Some("Dana Donor".to_string()),
            },
            organization_id,
            campaign_id: None,
            fee_coverage: FeeCoveragePolicy::PayerCoversFees,
            split_source: SplitSourceRef::default(),
            anonymous: false,
            frequency: DonationFrequency::OneTime,
            idempotency_key: None,
        }
    }

    fn succeeded_event(payment_intent: &StripePaymentIntent) -> StripeEvent {
        let mut object = serde_json::json!({
            "id": payment_intent.id,
            "amount": payment_intent.amount,
            "currency": payment_intent.currency,
            "status": payment_intent.status,
            "application_fee_amount": payment_intent.application_fee_amount,
            "metadata": payment_intent.metadata,
        });
        object["object"] = serde_json::json!("payment_intent");

        StripeEvent {
            id: Some("evt_1".to_string()),
            type_: PAYMENT_INTENT_SUCCEEDED.to_string(),
            created: None,
            livemode: Some(false),
            data: StripeEventData { object },
        }
    }

    #[tokio::test]
    async fn fifty_dollar_donation_with_fees_covered_end_to_end() {
        let org = organization(Some("acct_org"), true);
        let organization_id = org.id;
        let organizations = Arc::new(InMemoryOrganizations::default());
        organizations.insert(org).await;
        let donations = Arc::new(InMemoryDonations::default());

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .withf(|request| request.amount == 5_235 && request.application_fee_amount == 52)
            .times(1)
            .returning(|request| {
                Ok(StripePaymentIntent {
                    id: "pi_fifty".to_string(),
                    amount: request.amount,
                    currency: request.currency,
                    status: "requires_payment_method".to_string(),
                    client_secret: Some("pi_fifty_secret".to_string()),
                    application_fee_amount: Some(request.application_fee_amount),
                    metadata: request.metadata.into_iter().collect(),
                    transfer_data: None,
                    latest_charge: None,
                    last_payment_error: None,
                    created: None,
                })
            });
        let mut settled = settled_intent("pi_fifty", organization_id, 5_235, 52, vec![]);
        settled
            .metadata
            .insert(metadata_keys::DONATION_AMOUNT_MINOR.to_string(), "5000".to_string());
        stripe
            .expect_retrieve_payment_intent()
            .returning(move |_| Ok(settled.clone()));

        let use_case = use_case(Arc::clone(&donations), organizations, no_splits(), stripe);

        let handle = use_case.create_intent(intent(organization_id)).await.unwrap();
        assert_eq!(handle.charged_amount_minor, 5_235);
        assert_eq!(handle.donation_amount_minor, 5_000);
        assert!(!handle.split_active);

        let ReceiptStatus::Settled(receipt) = use_case.get_receipt("pi_fifty").await.unwrap() else {
            panic!("charge should be settled");
        };
        assert_eq!(receipt.amount_minor, 5_000);
        assert_eq!(receipt.charged_amount_minor, 5_235);
        assert_eq!(donations.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_split_is_rejected_before_any_charge() {
        let org = organization(Some("acct_org"), true);
        let partner = organization(Some("acct_partner"), true);
        let organization_id = org.id;
        let partner_id = partner.id;
        let organizations = Arc::new(InMemoryOrganizations::default());
        organizations.insert(org).await;
        organizations.insert(partner).await;

        let mut split_repo = MockSplitConfigurationRepository::new();
        split_repo.expect_find_entries().returning(move |kind, source_id| {
            let entries = if kind == SplitSourceKind::Form {
                vec![SplitEntryEntity {
                    id: Uuid::new_v4(),
                    organization_id,
                    source_kind: kind.to_string(),
                    source_id,
                    recipient_organization_id: Some(partner_id),
                    recipient_bank_account_id: None,
                    percentage_bps: 9_900,
                    position: 0,
                    created_at: Utc::now(),
                }]
            } else {
                Vec::new()
            };
            Box::pin(async move { Ok(entries) })
        });

        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_payment_intent().times(0);

        let use_case = use_case(
            Arc::new(InMemoryDonations::default()),
            organizations,
            split_repo,
            stripe,
        );

        assert!(matches!(
            use_case.create_intent(intent(organization_id)).await,
            Err(DonationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn too_small_donation_never_reaches_the_processor() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_payment_intent().times(0);
        let mut split_repo = MockSplitConfigurationRepository::new();
        split_repo.expect_find_entries().times(0);

        let use_case = use_case(
            Arc::new(InMemoryDonations::default()),
            Arc::new(InMemoryOrganizations::default()),
            split_repo,
            stripe,
        );

        let mut small = intent(Uuid::new_v4());
        small.amount_minor = 50;

        assert!(matches!(
            use_case.create_intent(small).await,
            Err(DonationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn pending_and_failed_charges_do_not_produce_receipts() {
        let organization_id = Uuid::new_v4();
        let mut pending = settled_intent("pi_pending", organization_id, 2_000, 20, vec![]);
        pending.status = "processing".to_string();
        let mut canceled = settled_intent("pi_canceled", organization_id, 2_000, 20, vec![]);
        canceled.status = "canceled".to_string();

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_payment_intent()
            .returning(move |id| match id.as_str() {
                "pi_pending" => Ok(pending.clone()),
                _ => Ok(canceled.clone()),
            });

        let donations = Arc::new(InMemoryDonations::default());
        let use_case = use_case(
            Arc::clone(&donations),
            Arc::new(InMemoryOrganizations::default()),
            no_splits(),
            stripe,
        );

        assert_eq!(
            use_case.get_receipt("pi_pending").await.unwrap(),
            ReceiptStatus::Pending
        );
        assert!(matches!(
            use_case.get_receipt("pi_canceled").await,
            Err(DonationError::ProcessorRejection(_))
        ));
        assert_eq!(donations.len().await, 0);
    }

    #[tokio::test]
    async fn succeeded_notification_records_the_donation_once() {
        let payment_intent = settled_intent("pi_hook", Uuid::new_v4(), 2_500, 25, vec![]);
        let event = succeeded_event(&payment_intent);

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));

        let donations = Arc::new(InMemoryDonations::default());
        let use_case = use_case(
            Arc::clone(&donations),
            Arc::new(InMemoryOrganizations::default()),
            no_splits(),
            stripe,
        );

        use_case.handle_stripe_webhook(b"{}", "t=1,v1=00").await.unwrap();
        use_case.handle_stripe_webhook(b"{}", "t=1,v1=00").await.unwrap();

        assert_eq!(donations.len().await, 1);
    }

    #[tokio::test]
    async fn other_events_and_bad_signatures() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(|_, signature| signature == "bad")
            .returning(|_, _| Err(StripeApiError::InvalidSignature("no matching signature".into())));
        stripe
            .expect_verify_webhook_signature()
            .withf(|_, signature| signature == "good")
            .returning(|_, _| {
                Ok(StripeEvent {
                    id: Some("evt_2".to_string()),
                    type_: "charge.refunded".to_string(),
                    created: None,
                    livemode: None,
                    data: StripeEventData {
                        object: serde_json::json!({}),
                    },
                })
            });

        let donations = Arc::new(InMemoryDonations::default());
        let use_case = use_case(
            Arc::clone(&donations),
            Arc::new(InMemoryOrganizations::default()),
            no_splits(),
            stripe,
        );

        assert!(matches!(
            use_case.handle_stripe_webhook(b"{}", "bad").await,
            Err(DonationError::Validation(_))
        ));
        use_case.handle_stripe_webhook(b"{}", "good").await.unwrap();
        assert_eq!(donations.len().await, 0);
    }
}
