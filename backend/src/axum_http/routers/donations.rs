use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            donations::DonationRepository, organizations::OrganizationRepository,
            payout_attempts::PayoutAttemptRepository,
            split_configurations::SplitConfigurationRepository,
        },
        value_objects::donations::DonationIntent,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            donations::DonationPostgres, organizations::OrganizationPostgres,
            payout_attempts::PayoutAttemptPostgres,
            split_configurations::SplitConfigurationPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        donations::{DonationUseCase, ReceiptStatus},
        stripe_gateway::StripeGateway,
    },
};

pub type PgDonationUseCase = DonationUseCase<
    DonationPostgres,
    PayoutAttemptPostgres,
    OrganizationPostgres,
    SplitConfigurationPostgres,
    StripeClient,
>;

pub fn donation_usecase(
    db_pool: Arc<PgPoolSquad>,
    stripe: Arc<StripeClient>,
    config: &DotEnvyConfig,
) -> PgDonationUseCase {
    DonationUseCase::new(
        Arc::new(DonationPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PayoutAttemptPostgres::new(Arc::clone(&db_pool))),
        Arc::new(OrganizationPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SplitConfigurationPostgres::new(Arc::clone(&db_pool))),
        stripe,
        config.fee_model,
        config.donations.idempotency_bucket_seconds,
    )
}

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe: Arc<StripeClient>, config: &DotEnvyConfig) -> Router {
    let donations_usecase = donation_usecase(db_pool, stripe, config);

    Router::new()
        .route("/intents", post(create_intent))
        .route("/receipts/:charge_reference", get(get_receipt))
        .with_state(Arc::new(donations_usecase))
}

pub async fn create_intent<D, P, O, S, G>(
    State(donations_usecase): State<Arc<DonationUseCase<D, P, O, S, G>>>,
    Json(intent): Json<DonationIntent>,
) -> impl IntoResponse
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    S: SplitConfigurationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match donations_usecase.create_intent(intent).await {
        Ok(handle) => (StatusCode::CREATED, Json(handle)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_receipt<D, P, O, S, G>(
    State(donations_usecase): State<Arc<DonationUseCase<D, P, O, S, G>>>,
    Path(charge_reference): Path<String>,
) -> impl IntoResponse
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    S: SplitConfigurationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match donations_usecase.get_receipt(&charge_reference).await {
        Ok(ReceiptStatus::Settled(receipt)) => (StatusCode::OK, Json(receipt)).into_response(),
        Ok(ReceiptStatus::Pending) => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}
