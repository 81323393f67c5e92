mod config;
mod layer;
mod notifier;
mod webhook_sink;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::AlertDispatcher;
use webhook_sink::WebhookAlertSink;

/// Installs the global subscriber: local-time fmt output filtered by `RUST_LOG`,
/// plus an alert layer when `ALERT_WEBHOOK_URL` is configured. Must run inside a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alert.as_ref() {
        Some(alert) => match WebhookAlertSink::new(alert.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink)]);
                Some(
                    AlertLayer::new(dispatcher, config.service_context.clone(), alert.min_level)
                        .with_filter(LevelFilter::from_level(alert.min_level)),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("alert webhook client could not be built: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &config.warnings {
        warn!(
            service = %context.service_name,
            stage = %context.stage,
            component = %context.component,
            warning = %warning,
            "observability config warning"
        );
    }
    info!(
        service = %context.service_name,
        stage = %context.stage,
        component = %context.component,
        alerts_enabled,
        "observability initialized"
    );

    Ok(())
}
