use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::notifier::{AlertEvent, AlertSink};

const MAX_TEXT_CHARS: usize = 3_500;

/// Posts `{"content": ...}` to a chat-style incoming webhook.
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn render(event: &AlertEvent) -> String {
    let mut text = format!(
        "[{}] {} {}/{} at {}\n{}",
        event.level,
        event.service_name,
        event.stage,
        event.component,
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.target,
    );
    if let Some(location) = event.location.as_ref() {
        text.push_str(&format!(" ({location})"));
    }
    if let Some(message) = event.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        text.push_str(&format!("\n{message}"));
    }
    if !event.span_path.is_empty() {
        text.push_str(&format!("\nin {}", event.span_path.join(" > ")));
    }
    for (key, value) in &event.fields {
        text.push_str(&format!("\n  {key} = {value}"));
    }

    if text.chars().count() > MAX_TEXT_CHARS {
        let mut cut: String = text.chars().take(MAX_TEXT_CHARS).collect();
        cut.push_str("\n(truncated)");
        return cut;
    }
    text
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": render(event) }))
            .send()
            .await
            .map_err(|err| {
                // reqwest errors carry the URL, which carries the webhook credential.
                if err.is_timeout() {
                    anyhow!("alert webhook timed out")
                } else if err.is_connect() {
                    anyhow!("alert webhook unreachable")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("alert webhook answered {}", response.status()));
        }
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "webhook"
    }
}
