use std::env;

use tracing::Level;
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert: Option<AlertConfig>,
    /// Reported once tracing is up; config problems here never stop the process.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: non_empty("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut warnings = Vec::new();

        let enabled = match non_empty("ALERT_NOTIFY_ENABLED") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!("ALERT_NOTIFY_ENABLED={raw} is not a boolean; keeping alerts on"));
                true
            }),
            None => true,
        };

        let webhook_url = match non_empty("ALERT_WEBHOOK_URL") {
            Some(raw) if enabled => match Url::parse(raw.trim()) {
                Ok(url) => Some(url),
                Err(err) => {
                    // The URL embeds a credential, so only the parse error is reported.
                    warnings.push(format!("ALERT_WEBHOOK_URL is invalid ({err}); alerts disabled"));
                    None
                }
            },
            _ => None,
        };

        let alert = webhook_url.map(|webhook_url| {
            let min_level = match non_empty("ALERT_NOTIFY_LEVEL") {
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    warnings.push(format!("ALERT_NOTIFY_LEVEL={raw} is unknown; using error"));
                    Level::ERROR
                }),
                None => Level::ERROR,
            };
            AlertConfig {
                webhook_url,
                min_level,
            }
        });

        Self {
            service_context,
            alert,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
