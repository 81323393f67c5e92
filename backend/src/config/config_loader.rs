use std::{env, str::FromStr};

use anyhow::{Context, Result, bail};
use crates::domain::value_objects::fees::FeeModel;

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, Donations, Stripe},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let stage = get_stage()?;

    let backend_server = BackendServer {
        port: required_parse("SERVER_PORT_BACKEND")?,
        body_limit: required_parse("SERVER_BODY_LIMIT")?,
        timeout: required_parse("SERVER_TIMEOUT")?,
    };

    let donations = Donations {
        idempotency_bucket_seconds: optional_parse("IDEMPOTENCY_BUCKET_SECONDS", 600)?,
    };
    if donations.idempotency_bucket_seconds <= 0 {
        bail!("IDEMPOTENCY_BUCKET_SECONDS must be positive");
    }

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database: load_database()?,
        stripe: load_stripe(stage)?,
        fee_model: load_fee_model()?,
        donations,
    })
}

pub fn get_stage() -> Result<Stage> {
    let raw = env::var("STAGE").unwrap_or_default();
    Stage::try_from(raw.as_str()).context("STAGE is invalid")
}

pub fn load_database() -> Result<Database> {
    Ok(Database {
        url: required("DATABASE_URL")?,
        max_connections: optional_parse("DATABASE_MAX_CONNECTIONS", 10)?,
        statement_timeout_seconds: optional_parse("DATABASE_STATEMENT_TIMEOUT_SECONDS", 10)?,
    })
}

pub fn load_stripe(stage: Stage) -> Result<Stripe> {
    let secret_key = required("STRIPE_SECRET_KEY")?;
    if !stage.accepts_secret_key(&secret_key) {
        bail!("STRIPE_SECRET_KEY does not match stage {stage}");
    }

    Ok(Stripe {
        secret_key,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_seconds: optional_parse("STRIPE_WEBHOOK_TOLERANCE_SECONDS", 300)?,
        request_timeout_seconds: optional_parse("STRIPE_REQUEST_TIMEOUT_SECONDS", 15)?,
        api_base: env::var("STRIPE_API_BASE").ok().filter(|v| !v.trim().is_empty()),
    })
}

pub fn load_fee_model() -> Result<FeeModel> {
    let defaults = FeeModel::default();
    let fee_model = FeeModel {
        processor_percent_bps: optional_parse(
            "PROCESSOR_FEE_PERCENT_BPS",
            defaults.processor_percent_bps,
        )?,
        processor_fixed_minor: optional_parse(
            "PROCESSOR_FEE_FIXED_MINOR",
            defaults.processor_fixed_minor,
        )?,
        platform_percent_bps: optional_parse(
            "PLATFORM_FEE_PERCENT_BPS",
            defaults.platform_percent_bps,
        )?,
        platform_fixed_minor: optional_parse(
            "PLATFORM_FEE_FIXED_MINOR",
            defaults.platform_fixed_minor,
        )?,
        minimum_amount_minor: optional_parse(
            "MINIMUM_DONATION_MINOR",
            defaults.minimum_amount_minor,
        )?,
    };

    let negative = [
        fee_model.processor_percent_bps,
        fee_model.processor_fixed_minor,
        fee_model.platform_percent_bps,
        fee_model.platform_fixed_minor,
    ]
    .iter()
    .any(|value| *value < 0);
    if negative || fee_model.processor_percent_bps + fee_model.platform_percent_bps >= 10_000 {
        bail!("fee model percentages must be non-negative and below 100%");
    }
    if fee_model.minimum_amount_minor <= 0 {
        bail!("MINIMUM_DONATION_MINOR must be positive");
    }

    Ok(fee_model)
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} is not set"))
}

fn required_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .trim()
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

pub fn optional_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        _ => Ok(default),
    }
}
