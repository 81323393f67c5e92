use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    recipient_kinds::RecipientKind, split_sources::SplitSourceKind,
};

/// A split list must add up to exactly this many basis points.
pub const FULL_SHARE_BPS: i32 = 10_000;

/// Upper bound on recipients per charge; each one costs a metadata slot on the charge.
pub const MAX_SPLIT_RECIPIENTS: usize = 10;

pub const SPLIT_SOURCE_KEY: &str = "split_source";
pub const SPLIT_HOLDING_ACCOUNT_KEY: &str = "split_holding_account";
pub const SPLIT_COUNT_KEY: &str = "split_count";
const SPLIT_ENTRY_KEY_PREFIX: &str = "split_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("split configuration has no recipients")]
    Empty,
    #[error("split configuration has {0} recipients; at most {max} are allowed", max = MAX_SPLIT_RECIPIENTS)]
    TooManyRecipients(usize),
    #[error("recipient {destination} has an invalid percentage of {bps} bps")]
    InvalidPercentage { destination: String, bps: i32 },
    #[error("split percentages add up to {total_bps} bps instead of {full}", full = FULL_SHARE_BPS)]
    SumMismatch { total_bps: i64 },
    #[error("recipient {0} appears more than once")]
    DuplicateRecipient(String),
    #[error("recipient organization {0} has no active payment destination")]
    InactiveRecipient(Uuid),
    #[error("bank account {0} is not attached to the receiving organization's destination")]
    UnattachedBankAccount(String),
    #[error("split snapshot on charge is malformed: {0}")]
    MalformedSnapshot(String),
    #[error("cannot distribute a negative amount ({0})")]
    NegativeAmount(i64),
}

/// One validated recipient of a split charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShare {
    pub split_entry_id: Uuid,
    pub kind: RecipientKind,
    /// Connected account id for transfers, external account id for bank payouts.
    pub destination: String,
    pub percentage_bps: i32,
}

/// An ordered, validated split list taken from exactly one configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitConfiguration {
    source: SplitSourceKind,
    shares: Vec<SplitShare>,
}

impl SplitConfiguration {
    pub fn new(source: SplitSourceKind, shares: Vec<SplitShare>) -> Result<Self, SplitError> {
        validate_shares(&shares)?;
        Ok(Self { source, shares })
    }

    pub fn source(&self) -> SplitSourceKind {
        self.source
    }

    pub fn shares(&self) -> &[SplitShare] {
        &self.shares
    }

    pub fn snapshot(&self, holding_account: &str) -> SplitSnapshot {
        SplitSnapshot {
            source: self.source,
            holding_account: holding_account.to_string(),
            shares: self.shares.clone(),
        }
    }
}

fn validate_shares(shares: &[SplitShare]) -> Result<(), SplitError> {
    if shares.is_empty() {
        return Err(SplitError::Empty);
    }
    if shares.len() > MAX_SPLIT_RECIPIENTS {
        return Err(SplitError::TooManyRecipients(shares.len()));
    }

    let mut seen = HashSet::new();
    let mut total_bps: i64 = 0;
    for share in shares {
        if share.percentage_bps <= 0 || share.percentage_bps > FULL_SHARE_BPS {
            return Err(SplitError::InvalidPercentage {
                destination: share.destination.clone(),
                bps: share.percentage_bps,
            });
        }
        if !seen.insert(share.destination.as_str()) {
            return Err(SplitError::DuplicateRecipient(share.destination.clone()));
        }
        total_bps += i64::from(share.percentage_bps);
    }

    if total_bps != i64::from(FULL_SHARE_BPS) {
        return Err(SplitError::SumMismatch { total_bps });
    }

    Ok(())
}

/// The split list frozen onto a charge at creation time. Distribution reads this,
/// never the live configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSnapshot {
    pub source: SplitSourceKind,
    pub holding_account: String,
    pub shares: Vec<SplitShare>,
}

impl SplitSnapshot {
    /// Encodes the snapshot as flat charge metadata: one `split_{n}` key per share,
    /// `entry_id|kind|destination|bps`, so no single value outgrows the processor's limit.
    pub fn to_metadata(&self) -> Vec<(String, String)> {
        let mut metadata = vec![
            (SPLIT_SOURCE_KEY.to_string(), self.source.to_string()),
            (
                SPLIT_HOLDING_ACCOUNT_KEY.to_string(),
                self.holding_account.clone(),
            ),
            (SPLIT_COUNT_KEY.to_string(), self.shares.len().to_string()),
        ];

        for (index, share) in self.shares.iter().enumerate() {
            metadata.push((
                format!("{SPLIT_ENTRY_KEY_PREFIX}{index}"),
                format!(
                    "{}|{}|{}|{}",
                    share.split_entry_id,
                    share.kind.short_code(),
                    share.destination,
                    share.percentage_bps
                ),
            ));
        }

        metadata
    }

    /// Reads a snapshot back from charge metadata. `Ok(None)` means the charge was not split.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Option<Self>, SplitError> {
        let Some(count) = metadata.get(SPLIT_COUNT_KEY) else {
            return Ok(None);
        };

        let count: usize = count
            .parse()
            .map_err(|_| SplitError::MalformedSnapshot(format!("bad split_count {count:?}")))?;

        let source = metadata
            .get(SPLIT_SOURCE_KEY)
            .and_then(|value| SplitSourceKind::from_str(value))
            .ok_or_else(|| SplitError::MalformedSnapshot("missing split_source".to_string()))?;

        let holding_account = metadata
            .get(SPLIT_HOLDING_ACCOUNT_KEY)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| {
                SplitError::MalformedSnapshot("missing split_holding_account".to_string())
            })?;

        let shares = (0..count)
            .map(|index| {
                let key = format!("{SPLIT_ENTRY_KEY_PREFIX}{index}");
                let raw = metadata
                    .get(&key)
                    .ok_or_else(|| SplitError::MalformedSnapshot(format!("missing {key}")))?;
                parse_share(raw)
                    .ok_or_else(|| SplitError::MalformedSnapshot(format!("bad {key}: {raw:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        validate_shares(&shares)?;

        Ok(Some(Self {
            source,
            holding_account,
            shares,
        }))
    }
}

fn parse_share(raw: &str) -> Option<SplitShare> {
    let mut parts = raw.split('|');
    let split_entry_id = Uuid::parse_str(parts.next()?).ok()?;
    let kind = RecipientKind::from_short_code(parts.next()?)?;
    let destination = parts.next().filter(|value| !value.is_empty())?.to_string();
    let percentage_bps = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(SplitShare {
        split_entry_id,
        kind,
        destination,
        percentage_bps,
    })
}

/// Divides `amount` across `shares` by percentage. Each share is rounded down and
/// the rounding residual goes to the first share, so the result always sums to `amount`.
pub fn allocate_shares(amount: i64, shares: &[SplitShare]) -> Result<Vec<i64>, SplitError> {
    if amount < 0 {
        return Err(SplitError::NegativeAmount(amount));
    }
    validate_shares(shares)?;

    let mut allocated: Vec<i64> = shares
        .iter()
        .map(|share| {
            (i128::from(amount) * i128::from(share.percentage_bps) / i128::from(FULL_SHARE_BPS))
                as i64
        })
        .collect();

    let residual = amount - allocated.iter().sum::<i64>();
    allocated[0] += residual;

    Ok(allocated)
}
