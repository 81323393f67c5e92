use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Who absorbs the processor and platform fees on a donation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeeCoveragePolicy {
    PayerCoversFees,
    #[default]
    OrganizationCoversFees,
}

impl FeeCoveragePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeCoveragePolicy::PayerCoversFees => "payer_covers_fees",
            FeeCoveragePolicy::OrganizationCoversFees => "organization_covers_fees",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "payer_covers_fees" => Some(FeeCoveragePolicy::PayerCoversFees),
            "organization_covers_fees" => Some(FeeCoveragePolicy::OrganizationCoversFees),
            _ => None,
        }
    }
}

impl Display for FeeCoveragePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
