use std::fmt::Display;

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Local,
    Development,
    Production,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Local => "local",
            Stage::Development => "development",
            Stage::Production => "production",
        };
        write!(f, "{}", stage)
    }
}

impl TryFrom<&str> for Stage {
    type Error = anyhow::Error;

    fn try_from(stage: &str) -> Result<Self> {
        match stage.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(Stage::Local),
            "dev" | "development" => Ok(Stage::Development),
            "prod" | "production" => Ok(Stage::Production),
            other => Err(anyhow!("unknown stage {other:?}")),
        }
    }
}

impl Stage {
    /// Live processor keys move real money and are only accepted in production.
    pub fn accepts_secret_key(&self, secret_key: &str) -> bool {
        let live = secret_key.starts_with("sk_live_") || secret_key.starts_with("rk_live_");
        match self {
            Stage::Production => live,
            Stage::Local | Stage::Development => !live,
        }
    }
}
