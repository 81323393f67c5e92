use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Ledger status of a donation row. Declined and in-flight charges are never recorded, so the
/// ledger only knows settled donations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Succeeded,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Succeeded => "succeeded",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(DonationStatus::Succeeded),
            _ => None,
        }
    }
}

impl Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_settled_rows_parse() {
        assert_eq!(
            DonationStatus::from_str("succeeded"),
            Some(DonationStatus::Succeeded)
        );
        assert_eq!(DonationStatus::from_str("pending"), None);
        assert_eq!(DonationStatus::from_str("failed"), None);
    }
}
