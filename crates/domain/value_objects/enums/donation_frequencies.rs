use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DonationFrequency {
    #[default]
    OneTime,
    Recurring,
}

impl DonationFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationFrequency::OneTime => "one_time",
            DonationFrequency::Recurring => "recurring",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "one_time" => Some(DonationFrequency::OneTime),
            "recurring" => Some(DonationFrequency::Recurring),
            _ => None,
        }
    }
}

impl Display for DonationFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
