use backend::config::{
    config_model::{Database, Stripe},
    stage::Stage,
};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub database: Database,
    pub stripe: Stripe,
    pub payout_redrive: PayoutRedrive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutRedrive {
    pub interval_seconds: u64,
    pub batch_size: i64,
    /// Attempts at or above this count are left for an operator.
    pub max_attempts: i32,
    /// A `pending` attempt untouched for this long is assumed abandoned mid-distribution.
    pub stale_after_seconds: i64,
}

impl Default for PayoutRedrive {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            batch_size: 50,
            max_attempts: 10,
            stale_after_seconds: 300,
        }
    }
}
