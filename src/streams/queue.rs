//! Message-queue transport
//!
//! [`MessageQueue`] is the pull/ack surface the consumer drives, and
//! [`QueueConnector`] opens a fresh one whenever the consumer recovers from a
//! failed cycle. [`PubSubConnector`] talks to the Pub/Sub REST API; tests
//! substitute in-memory queues.

use crate::config::ListenerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use std::time::Duration;

/// One delivered message, still owned by the queue until acknowledged
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Delivery tag used for acknowledgement
    pub ack_id: String,
    /// Raw payload bytes
    pub data: Vec<u8>,
}

/// Pull/ack operations against one queue connection
///
/// # Examples
///
/// ```no_run
/// use factiva_news::streams::{MessageQueue, PubSubConnector, QueueConnector};
/// use factiva_news::config::ListenerConfig;
///
/// # #[tokio::main]
/// # async fn main() -> factiva_news::Result<()> {
/// let connector = PubSubConnector::new(&ListenerConfig::default()).with_bearer_token("token");
/// let queue = connector.connect().await?;
/// let batch = queue.pull("projects/p/subscriptions/s", 10).await?;
/// let acks: Vec<String> = batch.into_iter().map(|m| m.ack_id).collect();
/// queue.acknowledge("projects/p/subscriptions/s", &acks).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Request at most `max_messages` messages
    async fn pull(&self, subscription_path: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge delivered messages so they are not redelivered
    async fn acknowledge(&self, subscription_path: &str, ack_ids: &[String]) -> Result<()>;
}

/// Opens queue connections
#[async_trait]
pub trait QueueConnector: Send + Sync {
    /// Establish a new connection
    async fn connect(&self) -> Result<Box<dyn MessageQueue>>;
}

/// Connector for the Pub/Sub REST API
#[derive(Clone, Debug)]
pub struct PubSubConnector {
    host: String,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl PubSubConnector {
    /// Build a connector from listener settings
    pub fn new(config: &ListenerConfig) -> Self {
        Self {
            host: config.pubsub_host.trim_end_matches('/').to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(90),
        }
    }

    /// Attach an OAuth access token to every request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Override the per-request timeout (pulls may block while waiting for messages)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl QueueConnector for PubSubConnector {
    async fn connect(&self) -> Result<Box<dyn MessageQueue>> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(Box::new(PubSubQueue {
            http,
            host: self.host.clone(),
            bearer_token: self.bearer_token.clone(),
        }))
    }
}

/// One Pub/Sub REST connection
#[derive(Clone, Debug)]
pub struct PubSubQueue {
    http: reqwest::Client,
    host: String,
    bearer_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    data: String,
}

impl PubSubQueue {
    async fn post(&self, url: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let mut request = self.http.post(url).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl MessageQueue for PubSubQueue {
    async fn pull(&self, subscription_path: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        let url = format!("{}/v1/{}:pull", self.host, subscription_path);
        let response = self
            .post(&url, serde_json::json!({ "maxMessages": max_messages }))
            .await?;
        let text = response.text().await?;
        let pulled: PullResponse = if text.trim().is_empty() {
            PullResponse {
                received_messages: Vec::new(),
            }
        } else {
            serde_json::from_str(&text)?
        };

        pulled
            .received_messages
            .into_iter()
            .map(|received| {
                let data = BASE64_STANDARD
                    .decode(received.message.data.as_bytes())
                    .map_err(|e| Error::InvalidResponse(format!("message data is not base64: {e}")))?;
                Ok(ReceivedMessage {
                    ack_id: received.ack_id,
                    data,
                })
            })
            .collect()
    }

    async fn acknowledge(&self, subscription_path: &str, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/v1/{}:acknowledge", self.host, subscription_path);
        self.post(&url, serde_json::json!({ "ackIds": ack_ids }))
            .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "projects/news-project/subscriptions/dj-synhub-stream-abc-filtered-xyz";

    fn connector(host: &str) -> PubSubConnector {
        let config = ListenerConfig {
            pubsub_host: host.to_string(),
            ..Default::default()
        };
        PubSubConnector::new(&config).with_bearer_token("tok")
    }

    #[tokio::test]
    async fn test_pull_decodes_base64_payloads() {
        let server = MockServer::start().await;
        let payload = BASE64_STANDARD.encode(br#"{"data":[{"id":"1","attributes":{"action":"add"}}]}"#);
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB}:pull")))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({"maxMessages": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "receivedMessages": [
                    {"ackId": "ack-1", "message": {"data": payload, "messageId": "m1"}}
                ]
            })))
            .mount(&server)
            .await;

        let queue = connector(&server.uri()).connect().await.unwrap();
        let messages = queue.pull(SUB, 5).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].ack_id, "ack-1");
        assert!(messages[0].data.starts_with(b"{\"data\""));
    }

    #[tokio::test]
    async fn test_pull_with_no_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let queue = connector(&server.uri()).connect().await.unwrap();
        assert!(queue.pull(SUB, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_sends_ack_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB}:acknowledge")))
            .and(body_json(serde_json::json!({"ackIds": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let queue = connector(&server.uri()).connect().await.unwrap();
        queue
            .acknowledge(SUB, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pull_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let queue = connector(&server.uri()).connect().await.unwrap();
        assert!(matches!(
            queue.pull(SUB, 10).await,
            Err(Error::Http { status: 503, .. })
        ));
    }
}
