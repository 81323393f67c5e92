use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How a split share reaches its recipient: a transfer to another connected
/// account, or a payout to a bank account attached to the holding account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    ConnectedAccount,
    BankAccount,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::ConnectedAccount => "connected_account",
            RecipientKind::BankAccount => "bank_account",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "connected_account" => Some(RecipientKind::ConnectedAccount),
            "bank_account" => Some(RecipientKind::BankAccount),
            _ => None,
        }
    }

    /// One-letter tag used inside charge metadata where space is limited.
    pub fn short_code(&self) -> &'static str {
        match self {
            RecipientKind::ConnectedAccount => "c",
            RecipientKind::BankAccount => "b",
        }
    }

    pub fn from_short_code(value: &str) -> Option<Self> {
        match value {
            "c" => Some(RecipientKind::ConnectedAccount),
            "b" => Some(RecipientKind::BankAccount),
            _ => None,
        }
    }
}

impl Display for RecipientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
