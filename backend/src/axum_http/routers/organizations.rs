use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::repositories::organizations::OrganizationRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::organizations::OrganizationPostgres,
    },
    payments::stripe_client::StripeClient,
};
use uuid::Uuid;

use crate::usecases::{account_provisioner::AccountProvisioner, stripe_gateway::StripeGateway};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe: Arc<StripeClient>) -> Router {
    let organization_repository = OrganizationPostgres::new(Arc::clone(&db_pool));
    let account_provisioner = AccountProvisioner::new(Arc::new(organization_repository), stripe);

    Router::new()
        .route("/:organization_id/payment-destination", post(ensure_destination))
        .route("/:organization_id/external-accounts", get(list_external_accounts))
        .with_state(Arc::new(account_provisioner))
}

pub async fn ensure_destination<O, G>(
    State(account_provisioner): State<Arc<AccountProvisioner<O, G>>>,
    Path(organization_id): Path<Uuid>,
) -> impl IntoResponse
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match account_provisioner.ensure_destination(organization_id).await {
        Ok(destination) => (StatusCode::OK, Json(destination)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_external_accounts<O, G>(
    State(account_provisioner): State<Arc<AccountProvisioner<O, G>>>,
    Path(organization_id): Path<Uuid>,
) -> impl IntoResponse
where
    O: OrganizationRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match account_provisioner.list_external_accounts(organization_id).await {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(err) => err.into_response(),
    }
}
