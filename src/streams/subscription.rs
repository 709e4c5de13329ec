//! Stream subscriptions

use crate::client::ApiClient;
use crate::error::{Error, Result, SubscriptionError};
use serde_json::Value;

/// Stream id owning a subscription id
///
/// Subscription ids are `{stream_id}-filtered-{suffix}`; the last two `-`
/// segments are dropped.
pub fn subscription_to_stream_id(subscription_id: &str) -> Result<String> {
    let parts: Vec<&str> = subscription_id.split('-').collect();
    if subscription_id.is_empty() || parts.len() < 3 {
        return Err(Error::InvalidArgument(format!(
            "'{subscription_id}' is not a subscription id"
        )));
    }
    Ok(parts[..parts.len() - 2].join("-"))
}

/// A delivery channel bound to one stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    id: Option<String>,
    stream_id: String,
    subscription_type: Option<String>,
}

impl Subscription {
    /// A subscription not yet created on the server
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            id: None,
            stream_id: stream_id.into(),
            subscription_type: None,
        }
    }

    /// A subscription the server already knows about
    pub fn existing(
        id: impl Into<String>,
        stream_id: impl Into<String>,
        subscription_type: Option<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            stream_id: stream_id.into(),
            subscription_type,
        }
    }

    /// Server-assigned id
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Parent stream id
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Subscription type reported by the server
    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    fn collection_url(&self, client: &ApiClient) -> String {
        format!("{}/subscriptions", client.endpoints().stream(&self.stream_id))
    }

    /// Create the subscription on the server
    ///
    /// # Errors
    /// [`SubscriptionError::AlreadyCreated`] if an id is already set.
    pub async fn create(&mut self, client: &ApiClient) -> Result<Value> {
        if let Some(id) = &self.id {
            return Err(SubscriptionError::AlreadyCreated { id: id.clone() }.into());
        }
        if self.stream_id.is_empty() {
            return Err(SubscriptionError::MissingStreamId.into());
        }

        let body = client.post_json(&self.collection_url(client), None).await?;
        let first = body
            .pointer("/data/0")
            .ok_or_else(|| Error::InvalidResponse("subscription response has no data".into()))?;
        let id = first
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("subscription response has no id".into()))?;

        tracing::info!(stream_id = %self.stream_id, subscription_id = %id, "subscription created");
        self.id = Some(id.to_string());
        self.subscription_type = first.get("type").and_then(Value::as_str).map(str::to_string);
        Ok(body)
    }

    /// Delete the subscription on the server
    ///
    /// # Errors
    /// [`SubscriptionError::NotCreated`] without an id.
    pub async fn delete(&self, client: &ApiClient) -> Result<()> {
        let id = self.id.as_deref().ok_or(SubscriptionError::NotCreated)?;
        let url = format!("{}/{}", self.collection_url(client), id);
        client.delete_json(&url).await?;
        tracing::info!(stream_id = %self.stream_id, subscription_id = %id, "subscription deleted");
        Ok(())
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Subscription(id={}, type={})",
            self.id.as_deref().unwrap_or("-"),
            self.subscription_type.as_deref().unwrap_or("-")
        )
    }
}
