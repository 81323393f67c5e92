use anyhow::{Result, bail};
use backend::config::config_loader::{get_stage, load_database, load_stripe, optional_parse};

use super::config_model::{DotEnvyConfig, PayoutRedrive};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let stage = get_stage()?;

    Ok(DotEnvyConfig {
        stage,
        database: load_database()?,
        stripe: load_stripe(stage)?,
        payout_redrive: load_payout_redrive()?,
    })
}

pub fn load_payout_redrive() -> Result<PayoutRedrive> {
    let defaults = PayoutRedrive::default();
    let payout_redrive = PayoutRedrive {
        interval_seconds: optional_parse("PAYOUT_REDRIVE_INTERVAL_SECONDS", defaults.interval_seconds)?,
        batch_size: optional_parse("PAYOUT_REDRIVE_BATCH_SIZE", defaults.batch_size)?,
        max_attempts: optional_parse("PAYOUT_REDRIVE_MAX_ATTEMPTS", defaults.max_attempts)?,
        stale_after_seconds: optional_parse(
            "PAYOUT_REDRIVE_STALE_AFTER_SECONDS",
            defaults.stale_after_seconds,
        )?,
    };

    if payout_redrive.interval_seconds == 0 {
        bail!("PAYOUT_REDRIVE_INTERVAL_SECONDS must be positive");
    }
    if payout_redrive.batch_size <= 0 || payout_redrive.max_attempts <= 0 {
        bail!("PAYOUT_REDRIVE_BATCH_SIZE and PAYOUT_REDRIVE_MAX_ATTEMPTS must be positive");
    }
    if payout_redrive.stale_after_seconds < 0 {
        bail!("PAYOUT_REDRIVE_STALE_AFTER_SECONDS must not be negative");
    }

    Ok(payout_redrive)
}
