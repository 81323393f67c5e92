use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::{
    errors::UseCaseResult, payout_distributor::PayoutDistributor, stripe_gateway::StripeGateway,
};
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{donations::DonationRepository, payout_attempts::PayoutAttemptRepository},
    value_objects::enums::payout_statuses::PayoutStatus,
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::config_model::PayoutRedrive;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedriveSummary {
    pub charges: usize,
    /// Charges whose every share has now been paid.
    pub completed: usize,
    pub still_failing: usize,
    /// Charges the distributor could not even start on.
    pub errored: usize,
}

pub async fn run<D, P, G>(
    distributor: Arc<PayoutDistributor<D, P, G>>,
    config: PayoutRedrive,
) -> Result<()>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    info!(
        interval_seconds = config.interval_seconds,
        batch_size = config.batch_size,
        max_attempts = config.max_attempts,
        "payout_redrive: starting worker loop"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match redrive_once(&distributor, &config, Utc::now()).await {
            Ok(summary) if summary.charges == 0 => {}
            Ok(summary) => info!(
                charges = summary.charges,
                completed = summary.completed,
                still_failing = summary.still_failing,
                errored = summary.errored,
                "payout_redrive: pass finished"
            ),
            Err(e) => error!(error = %e, "payout_redrive: could not list redrivable charges"),
        }
    }
}

/// One pass: re-invokes distribution for every charge that still owes someone money.
pub async fn redrive_once<D, P, G>(
    distributor: &PayoutDistributor<D, P, G>,
    config: &PayoutRedrive,
    now: DateTime<Utc>,
) -> UseCaseResult<RedriveSummary>
where
    D: DonationRepository + Send + Sync + 'static,
    P: PayoutAttemptRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let stale_before = now - chrono::Duration::seconds(config.stale_after_seconds);
    let charge_references = distributor
        .redrivable_charges(config.max_attempts, stale_before, config.batch_size)
        .await?;

    let mut summary = RedriveSummary {
        charges: charge_references.len(),
        ..RedriveSummary::default()
    };

    for charge_reference in charge_references {
        match distributor.distribute(&charge_reference).await {
            Ok(attempts) => {
                let unpaid = attempts
                    .iter()
                    .filter(|attempt| attempt.status != PayoutStatus::Succeeded.as_str())
                    .count();
                if unpaid == 0 {
                    summary.completed += 1;
                } else {
                    warn!(%charge_reference, unpaid, "payout_redrive: shares still unpaid");
                    summary.still_failing += 1;
                }
            }
            Err(e) => {
                error!(%charge_reference, error = %e, "payout_redrive: distribution failed");
                summary.errored += 1;
            }
        }
    }

    Ok(summary)
}
