use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Where a split configuration is attached. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SplitSourceKind {
    Link,
    Card,
    Form,
}

impl SplitSourceKind {
    pub const PRECEDENCE: [SplitSourceKind; 3] =
        [SplitSourceKind::Link, SplitSourceKind::Card, SplitSourceKind::Form];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitSourceKind::Link => "link",
            SplitSourceKind::Card => "card",
            SplitSourceKind::Form => "form",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "link" => Some(SplitSourceKind::Link),
            "card" => Some(SplitSourceKind::Card),
            "form" => Some(SplitSourceKind::Form),
            _ => None,
        }
    }
}

impl Display for SplitSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
