//! Stream management: create, inspect and delete streams and their subscriptions

use super::subscription::Subscription;
use crate::client::ApiClient;
use crate::error::{Error, Result, SubscriptionError};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// A stream resource as reported by the service
#[derive(Clone, Debug, Deserialize)]
pub struct StreamInfo {
    /// Stream id
    pub id: String,
    /// Resource type
    #[serde(rename = "type", default)]
    pub stream_type: Option<String>,
    /// Stream attributes (`job_status`, query, counters)
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Related resources, including subscriptions
    #[serde(default)]
    pub relationships: Value,
}

impl StreamInfo {
    /// Server-side job status of the stream
    pub fn job_status(&self) -> Option<&str> {
        self.attributes.get("job_status").and_then(Value::as_str)
    }

    fn subscription_refs(&self) -> Vec<(String, Option<String>)> {
        self.relationships
            .pointer("/subscriptions/data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let id = item.get("id")?.as_str()?.to_string();
                        let kind = item.get("type").and_then(Value::as_str).map(str::to_string);
                        Some((id, kind))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn stream_from_body(body: &Value) -> Result<StreamInfo> {
    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| Error::InvalidResponse("stream response has no data".into()))?;
    Ok(serde_json::from_value(data)?)
}

/// Client for one stream and its subscriptions
#[derive(Clone, Debug)]
pub struct StreamClient {
    client: ApiClient,
    stream_id: Option<String>,
    subscriptions: BTreeMap<String, Subscription>,
}

impl StreamClient {
    /// Client for a stream that does not exist yet
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            stream_id: None,
            subscriptions: BTreeMap::new(),
        }
    }

    /// Client for an existing stream; call [`load_subscriptions`](Self::load_subscriptions) to populate it
    pub fn for_stream(client: ApiClient, stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: Some(stream_id.into()),
            ..Self::new(client)
        }
    }

    /// Stream id, once created or attached
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    fn require_stream_id(&self) -> Result<&str> {
        self.stream_id
            .as_deref()
            .ok_or_else(|| SubscriptionError::MissingStreamId.into())
    }

    fn register(&mut self, info: &StreamInfo) {
        for (id, kind) in info.subscription_refs() {
            let subscription = Subscription::existing(id.clone(), info.id.clone(), kind);
            self.subscriptions.insert(id, subscription);
        }
    }

    async fn create_from(&mut self, url: &str, payload: Option<&Value>) -> Result<StreamInfo> {
        let body = self.client.post_json(url, payload).await?;
        let info = stream_from_body(&body)?;
        tracing::info!(stream_id = %info.id, "stream created");
        self.stream_id = Some(info.id.clone());
        self.register(&info);
        Ok(info)
    }

    /// Create a stream from a `where` clause
    pub async fn create_by_query(&mut self, where_clause: &str) -> Result<StreamInfo> {
        if where_clause.trim().is_empty() {
            return Err(Error::InvalidArgument("stream query is empty".into()));
        }
        let payload = json!({
            "data": {
                "attributes": {"where": where_clause},
                "type": "stream"
            }
        });
        let url = self.client.endpoints().streams();
        self.create_from(&url, Some(&payload)).await
    }

    /// Create a stream seeded from an existing snapshot's query
    pub async fn create_by_snapshot(&mut self, snapshot_id: &str) -> Result<StreamInfo> {
        if snapshot_id.trim().is_empty() {
            return Err(Error::InvalidArgument("snapshot id is empty".into()));
        }
        let url = self.client.endpoints().snapshot_streams(snapshot_id);
        self.create_from(&url, None).await
    }

    /// Current state of the stream
    pub async fn info(&self) -> Result<StreamInfo> {
        let url = self.client.endpoints().stream(self.require_stream_id()?);
        let body = self.client.get_json(&url).await?;
        stream_from_body(&body)
    }

    /// Every stream visible to the account
    pub async fn list_all(&self) -> Result<Vec<StreamInfo>> {
        let body = self.client.get_json(&self.client.endpoints().streams()).await?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("streams response has no data".into()))?;
        Ok(serde_json::from_value(data)?)
    }

    /// Delete the stream
    pub async fn delete(&mut self) -> Result<StreamInfo> {
        let url = self.client.endpoints().stream(self.require_stream_id()?);
        let body = self.client.delete_json(&url).await?;
        let info = stream_from_body(&body)?;
        tracing::info!(stream_id = %info.id, "stream deleted");
        self.subscriptions.clear();
        Ok(info)
    }

    /// Fetch the stream and register all of its subscriptions
    pub async fn load_subscriptions(&mut self) -> Result<()> {
        let info = self.info().await?;
        self.register(&info);
        Ok(())
    }

    /// Add a subscription to the stream, returning its id
    pub async fn create_subscription(&mut self) -> Result<String> {
        let stream_id = self.require_stream_id()?.to_string();
        let mut subscription = Subscription::new(stream_id);
        subscription.create(&self.client).await?;
        let id = subscription
            .id()
            .map(str::to_string)
            .ok_or(SubscriptionError::NotCreated)?;
        self.subscriptions.insert(id.clone(), subscription);
        Ok(id)
    }

    /// Delete one of this stream's subscriptions
    ///
    /// # Errors
    /// [`SubscriptionError::Unknown`] if the id is not registered on this client.
    pub async fn delete_subscription(&mut self, subscription_id: &str) -> Result<()> {
        let subscription = self.subscriptions.get(subscription_id).ok_or_else(|| {
            SubscriptionError::Unknown {
                id: subscription_id.to_string(),
                stream_id: self.stream_id.clone().unwrap_or_default(),
            }
        })?;
        subscription.delete(&self.client).await?;
        self.subscriptions.remove(subscription_id);
        Ok(())
    }

    /// Registered subscription ids, sorted
    pub fn subscription_ids(&self) -> Vec<String> {
        self.subscriptions.keys().cloned().collect()
    }

    /// A registered subscription
    pub fn subscription(&self, subscription_id: &str) -> Option<&Subscription> {
        self.subscriptions.get(subscription_id)
    }
}
