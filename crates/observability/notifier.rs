use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{Level, warn};

const ALERT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    /// Event fields plus the fields of every enclosing span, innermost last.
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn sink_name(&self) -> &'static str;
}

/// Hands alert events to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(ALERT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&event).await {
                        // Logged below the alert threshold so a dead sink cannot feed itself.
                        warn!(sink = sink.sink_name(), error = %err, "alert delivery failed");
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            warn!(reason, "alert dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct RecordingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, event: &AlertEvent) -> Result<()> {
            self.seen
                .lock()
                .await
                .push(event.message.clone().unwrap_or_default());
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn dispatched_events_reach_every_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::spawn(vec![Arc::new(RecordingSink {
            seen: Arc::clone(&seen),
        })]);

        dispatcher.dispatch(AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "backend".to_string(),
            stage: "local".to_string(),
            component: "backend".to_string(),
            target: "payouts".to_string(),
            location: None,
            message: Some("payout failed".to_string()),
            fields: BTreeMap::new(),
            span_path: Vec::new(),
        });

        for _ in 0..50 {
            if !seen.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(seen.lock().await.as_slice(), ["payout failed".to_string()]);
    }
}
