//! Background account-quota monitoring
//!
//! When an account exceeds its document cap the service stops enqueueing new
//! documents for the stream and reports the `DOC_COUNT_EXCEEDED` job status.
//! Already queued documents stay deliverable, so this is a warning signal,
//! never a consumer error.

use super::subscription::subscription_to_stream_id;
use crate::account::AccountClient;
use crate::client::ApiClient;
use crate::config::ListenerConfig;
use crate::error::Result;
use crate::types::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Stream job status reported once the account cap is reached
pub const STREAM_DISABLED_STATUS: &str = "DOC_COUNT_EXCEEDED";

/// Result of one quota check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Account document cap
    pub max_allowed_extractions: Option<u64>,
    /// Whether the stream stopped enqueueing new documents
    pub is_disabled: bool,
    /// When the check ran
    pub checked_at: DateTime<Utc>,
}

/// Periodically checks account limits and the stream's disabled flag
pub struct QuotaMonitor {
    account: AccountClient,
    client: ApiClient,
    stream_id: String,
    interval: Duration,
    events: Option<broadcast::Sender<Event>>,
    span: tracing::Span,
}

impl QuotaMonitor {
    /// Monitor the stream owning `subscription_id`
    pub fn new(client: ApiClient, subscription_id: &str, interval: Duration) -> Result<Self> {
        let stream_id = subscription_to_stream_id(subscription_id)?;
        let span = tracing::info_span!("quota_monitor", stream_id = %stream_id);
        Ok(Self {
            account: AccountClient::new(client.clone()),
            client,
            stream_id,
            interval,
            events: None,
            span,
        })
    }

    /// Monitor the stream owning `subscription_id` at the configured check interval
    pub fn from_config(
        client: ApiClient,
        subscription_id: &str,
        config: &ListenerConfig,
    ) -> Result<Self> {
        Self::new(client, subscription_id, config.quota_check_interval)
    }

    /// Publish [`Event::StreamDisabled`] on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run all logging inside `span`
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Monitored stream id
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Run one check
    pub async fn check(&self) -> Result<QuotaSnapshot> {
        let info = self.account.account_info().await?;
        let max = info.max_allowed_extractions;

        let body = self
            .client
            .get_json(&self.client.endpoints().stream(&self.stream_id))
            .await?;
        let is_disabled = body
            .pointer("/data/attributes/job_status")
            .and_then(Value::as_str)
            == Some(STREAM_DISABLED_STATUS);

        if is_disabled {
            let cap = max.map_or_else(|| "unknown".to_string(), |m| m.to_string());
            tracing::warn!(
                stream_id = %self.stream_id,
                max_allowed_extractions = %cap,
                "maximum number of documents received for the account ({cap}) exceeded: \
                 no new documents will be added to the stream's queue, \
                 documents already queued will still be delivered"
            );
            if let Some(events) = &self.events {
                events
                    .send(Event::StreamDisabled {
                        stream_id: self.stream_id.clone(),
                        max_allowed_extractions: max,
                    })
                    .ok();
            }
        }

        Ok(QuotaSnapshot {
            max_allowed_extractions: max,
            is_disabled,
            checked_at: Utc::now(),
        })
    }

    /// Spawn the periodic check
    ///
    /// The first check runs immediately; the next one is scheduled `interval`
    /// later whether or not the previous check succeeded. Stopping abandons a
    /// check that is still in flight.
    pub fn start(self) -> QuotaMonitorHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let token = cancel.clone();
        let span = self.span.clone();

        let task = tokio::spawn(
            async move {
                loop {
                    let checked = tokio::select! {
                        _ = token.cancelled() => break,
                        checked = self.check() => checked,
                    };
                    match checked {
                        Ok(snapshot) => {
                            tx.send_replace(Some(snapshot));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "quota check failed");
                        }
                    }
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
                tracing::debug!("quota monitor stopped");
            }
            .instrument(span),
        );

        QuotaMonitorHandle {
            cancel,
            task,
            snapshots: rx,
        }
    }
}

/// Running [`QuotaMonitor`]
pub struct QuotaMonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    snapshots: watch::Receiver<Option<QuotaSnapshot>>,
}

impl QuotaMonitorHandle {
    /// Most recent successful check
    pub fn latest(&self) -> Option<QuotaSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<QuotaSnapshot>> {
        self.snapshots.clone()
    }

    /// Stop the periodic check and wait for the task to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "quota monitor task panicked");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserKey;
    use crate::config::ApiConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "dj-synhub-stream-abc-filtered-xyz";

    fn client(host: &str) -> ApiClient {
        let config = ApiConfig {
            host: host.to_string(),
            ..Default::default()
        };
        ApiClient::new(&config, UserKey::new("KEY").unwrap()).unwrap()
    }

    async fn mount(server: &MockServer, job_status: &str) {
        Mock::given(method("GET"))
            .and(path("/alpha/accounts/KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"attributes": {"max_allowed_extractions": 1000}}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alpha/streams/dj-synhub-stream-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "dj-synhub-stream-abc", "attributes": {"job_status": job_status}}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_check_detects_disabled_stream() {
        let server = MockServer::start().await;
        mount(&server, STREAM_DISABLED_STATUS).await;
        let (tx, mut rx) = broadcast::channel(4);

        let monitor = QuotaMonitor::new(client(&server.uri()), SUB, Duration::from_secs(300))
            .unwrap()
            .with_events(tx);
        assert_eq!(monitor.stream_id(), "dj-synhub-stream-abc");

        let snapshot = monitor.check().await.unwrap();
        assert!(snapshot.is_disabled);
        assert_eq!(snapshot.max_allowed_extractions, Some(1000));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Event::StreamDisabled { max_allowed_extractions: Some(1000), .. }
        ));
    }

    #[tokio::test]
    async fn test_check_running_stream() {
        let server = MockServer::start().await;
        mount(&server, "JOB_STATE_RUNNING").await;

        let monitor =
            QuotaMonitor::new(client(&server.uri()), SUB, Duration::from_secs(300)).unwrap();
        assert!(!monitor.check().await.unwrap().is_disabled);
    }

    #[tokio::test]
    async fn test_background_task_publishes_and_stops() {
        let server = MockServer::start().await;
        mount(&server, STREAM_DISABLED_STATUS).await;

        let handle = QuotaMonitor::new(client(&server.uri()), SUB, Duration::from_millis(20))
            .unwrap()
            .start();
        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.is_some()))
            .await
            .unwrap()
            .unwrap();

        assert!(handle.latest().unwrap().is_disabled);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_failed_check_keeps_rescheduling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2..)
            .mount(&server)
            .await;

        let handle = QuotaMonitor::new(client(&server.uri()), SUB, Duration::from_millis(10))
            .unwrap()
            .start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.latest().is_none());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_abandons_slow_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
            .mount(&server)
            .await;

        let handle = QuotaMonitor::new(client(&server.uri()), SUB, Duration::from_secs(300))
            .unwrap()
            .start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("stop should not wait for the in-flight check");
    }

    #[test]
    fn test_from_config_uses_check_interval() {
        let config = ListenerConfig {
            quota_check_interval: Duration::from_secs(42),
            ..Default::default()
        };
        let monitor =
            QuotaMonitor::from_config(client("http://localhost:1"), SUB, &config).unwrap();
        assert_eq!(monitor.interval, Duration::from_secs(42));
    }

    #[test]
    fn test_rejects_malformed_subscription() {
        assert!(QuotaMonitor::new(client("http://localhost:1"), "nope", Duration::from_secs(1)).is_err());
    }
}
