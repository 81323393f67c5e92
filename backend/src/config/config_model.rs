use std::time::Duration;

use crates::{
    domain::value_objects::fees::FeeModel,
    infra::db::postgres::postgres_connection::PoolSettings,
    payments::stripe_client::StripeClientConfig,
};

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub fee_model: FeeModel,
    pub donations: Donations,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub statement_timeout_seconds: u64,
}

impl Database {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.max_connections,
            statement_timeout: Duration::from_secs(self.statement_timeout_seconds),
            ..PoolSettings::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_seconds: i64,
    pub request_timeout_seconds: u64,
    pub api_base: Option<String>,
}

impl Stripe {
    pub fn client_config(&self) -> StripeClientConfig {
        StripeClientConfig {
            secret_key: self.secret_key.clone(),
            webhook_secret: self.webhook_secret.clone(),
            webhook_tolerance_seconds: self.webhook_tolerance_seconds,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            api_base: self.api_base.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Donations {
    pub idempotency_bucket_seconds: i64,
}
