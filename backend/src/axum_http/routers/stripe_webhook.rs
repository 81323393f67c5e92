use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::{
        donations::DonationRepository, organizations::OrganizationRepository,
        payout_attempts::PayoutAttemptRepository,
        split_configurations::SplitConfigurationRepository,
    },
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::warn;

use crate::{
    axum_http::{error_responses::ErrorResponse, routers::donations::donation_usecase},
    config::config_model::DotEnvyConfig,
    usecases::{donations::DonationUseCase, stripe_gateway::StripeGateway},
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe: Arc<StripeClient>, config: &DotEnvyConfig) -> Router {
    let donations_usecase = donation_usecase(db_pool, stripe, config);

    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .with_state(Arc::new(donations_usecase))
}

/// Takes the raw body: the signature covers the exact bytes the processor sent.
pub async fn handle_stripe_webhook<D, P, O, S, G>(
    State(donations_usecase): State<Arc<DonationUseCase<D, P, O, S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    O: OrganizationRepository + Send + Sync + 'static,
    S: SplitConfigurationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("webhooks: request without a signature header");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                StatusCode::BAD_REQUEST,
                "missing Stripe-Signature header",
            )),
        )
            .into_response();
    };

    match donations_usecase
        .handle_stripe_webhook(&body, signature)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => err.into_response(),
    }
}
