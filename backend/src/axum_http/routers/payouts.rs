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
        repositories::{donations::DonationRepository, payout_attempts::PayoutAttemptRepository},
        value_objects::donations::PayoutAttemptDto,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{donations::DonationPostgres, payout_attempts::PayoutAttemptPostgres},
    },
    payments::stripe_client::StripeClient,
};

use crate::usecases::{payout_distributor::PayoutDistributor, stripe_gateway::StripeGateway};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe: Arc<StripeClient>) -> Router {
    let donation_repository = DonationPostgres::new(Arc::clone(&db_pool));
    let payout_attempt_repository = PayoutAttemptPostgres::new(Arc::clone(&db_pool));
    let payout_distributor = PayoutDistributor::new(
        Arc::new(donation_repository),
        Arc::new(payout_attempt_repository),
        stripe,
    );

    Router::new()
        .route("/:charge_reference", get(list_attempts))
        .route("/:charge_reference/redrive", post(redrive))
        .with_state(Arc::new(payout_distributor))
}

pub async fn list_attempts<D, P, G>(
    State(payout_distributor): State<Arc<PayoutDistributor<D, P, G>>>,
    Path(charge_reference): Path<String>,
) -> impl IntoResponse
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match payout_distributor.list_attempts(&charge_reference).await {
        Ok(attempts) => (StatusCode::OK, Json(attempts)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Re-runs distribution for one charge. Shares that already succeeded are left alone.
pub async fn redrive<D, P, G>(
    State(payout_distributor): State<Arc<PayoutDistributor<D, P, G>>>,
    Path(charge_reference): Path<String>,
) -> impl IntoResponse
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match payout_distributor.distribute(&charge_reference).await {
        Ok(attempts) => {
            let attempts: Vec<PayoutAttemptDto> =
                attempts.into_iter().map(PayoutAttemptDto::from).collect();
            (StatusCode::OK, Json(attempts)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
