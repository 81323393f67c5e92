use anyhow::Result;
use backend::usecases::payout_distributor::PayoutDistributor;
use crates::{
    infra::db::{
        postgres::postgres_connection,
        repositories::{donations::DonationPostgres, payout_attempts::PayoutAttemptPostgres},
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::{error, info};
use worker::{config, payout_redrive};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection_with(
        &dotenvy_env.database.url,
        dotenvy_env.database.pool_settings(),
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let stripe = Arc::new(StripeClient::new(dotenvy_env.stripe.client_config())?);

    let payout_distributor = Arc::new(PayoutDistributor::new(
        Arc::new(DonationPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(PayoutAttemptPostgres::new(Arc::clone(&db_pool_arc))),
        stripe,
    ));

    let payout_redrive_loop = tokio::spawn(payout_redrive::worker::run(
        payout_distributor,
        dotenvy_env.payout_redrive,
    ));

    tokio::select! {
        result = payout_redrive_loop => result??,
        _ = tokio::signal::ctrl_c() => info!("Received ctrl+C signal"),
    };

    Ok(())
}
