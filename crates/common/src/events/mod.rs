//! Outbound article-change notifications
//!
//! Provides:
//! - SQS event sink with retry logic (fire-and-forget, best-effort)
//! - A post-commit outbox so notifications are only sent after the
//!   owning storage transaction has durably committed

use crate::config::EventsConfig;
use crate::ids::Msid;
use aws_sdk_sqs::Client as SqsClient;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Notification published for every committed article change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Msid,
}

impl ArticleEvent {
    pub fn new(msid: Msid) -> Self {
        Self {
            kind: "article".to_string(),
            id: msid,
        }
    }
}

/// SQS-backed event sink. Failures are logged and never propagate to
/// the triggering request.
pub struct EventSink {
    client: Option<SqsClient>,
    queue_url: Option<String>,
    max_retries: u32,
}

impl EventSink {
    /// Create a sink from configuration. An unset queue URL yields a
    /// disabled sink that only logs.
    pub async fn from_config(config: &EventsConfig) -> Self {
        let client = match config.queue_url {
            Some(_) => {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                Some(SqsClient::new(&aws_config))
            }
            None => {
                info!("event notifications disabled (no queue URL configured)");
                None
            }
        };

        Self {
            client,
            queue_url: config.queue_url.clone(),
            max_retries: config.max_retries,
        }
    }

    /// A disabled sink, for tests and tooling.
    pub fn disabled() -> Self {
        Self {
            client: None,
            queue_url: None,
            max_retries: 0,
        }
    }

    /// Notify downstream consumers that an article changed.
    /// Best-effort: logs and returns on failure.
    pub async fn notify(&self, msid: Msid) {
        let (Some(client), Some(queue_url)) = (&self.client, &self.queue_url) else {
            debug!(msid, "event sink disabled, dropping notification");
            return;
        };

        let body = match serde_json::to_string(&ArticleEvent::new(msid)) {
            Ok(body) => body,
            Err(e) => {
                warn!(msid, error = %e, "failed to serialize article event");
                return;
            }
        };

        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let result = retry(backoff, || async {
            client
                .send_message()
                .queue_url(queue_url)
                .message_body(body.clone())
                .send()
                .await
                .map_err(|e| {
                    if attempts.fetch_add(1, Ordering::SeqCst) >= max_retries {
                        backoff::Error::permanent(e)
                    } else {
                        backoff::Error::transient(e)
                    }
                })
        })
        .await;

        match result {
            Ok(output) => {
                debug!(
                    msid,
                    message_id = %output.message_id.unwrap_or_default(),
                    "article event published"
                );
            }
            Err(e) => {
                warn!(msid, error = %e, "failed to publish article event");
            }
        }
    }
}

/// Post-commit notification list attached to a unit of work.
///
/// Callers push article ids while the transaction is open and drain
/// the outbox only after commit; a rolled-back transaction drops its
/// outbox without sending anything.
#[derive(Debug, Default)]
pub struct Outbox {
    msids: Vec<Msid>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an article to notify about after commit.
    pub fn push(&mut self, msid: Msid) {
        if !self.msids.contains(&msid) {
            self.msids.push(msid);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.msids.is_empty()
    }

    /// Send every recorded notification. Call only after the owning
    /// transaction has committed.
    pub async fn drain(self, sink: &EventSink) {
        for msid in self.msids {
            sink.notify(msid).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_dedupes() {
        let mut outbox = Outbox::new();
        outbox.push(3);
        outbox.push(5);
        outbox.push(3);
        assert_eq!(outbox.msids, vec![3, 5]);
    }

    #[test]
    fn test_article_event_shape() {
        let event = ArticleEvent::new(9560);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "article");
        assert_eq!(json["id"], 9560);
    }

    #[tokio::test]
    async fn test_disabled_sink_never_fails() {
        let sink = EventSink::disabled();
        sink.notify(3).await;

        let mut outbox = Outbox::new();
        outbox.push(3);
        outbox.drain(&sink).await;
    }
}
