//! Account key, account limits and streaming credentials

use crate::client::ApiClient;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable holding the account key
pub const API_KEY_ENV: &str = "FACTIVA_APIKEY";

/// Account API key
///
/// The `Debug` output never shows the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct UserKey(String);

impl UserKey {
    /// Wrap an account key
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the key is blank
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(Error::Config {
                message: "user key is empty".to_string(),
                key: Some(API_KEY_ENV.to_string()),
            });
        }
        Ok(Self(key))
    }

    /// Read the key from `FACTIVA_APIKEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| Error::Config {
            message: "user key environment variable is not set".to_string(),
            key: Some(API_KEY_ENV.to_string()),
        })?;
        Self::new(key)
    }

    /// Raw key value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "UserKey(****{tail})")
    }
}

/// Account limits and usage counters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account display name
    #[serde(default)]
    pub name: Option<String>,
    /// Maximum number of extractions allowed for the account
    #[serde(default)]
    pub max_allowed_extractions: Option<u64>,
    /// Maximum number of documents the account may extract
    #[serde(default)]
    pub max_allowed_extracted_documents: Option<u64>,
    /// Extractions run so far
    #[serde(default, alias = "cnt_curr_ext")]
    pub total_extractions: Option<u64>,
    /// Documents extracted so far
    #[serde(default)]
    pub total_extracted_documents: Option<u64>,
    /// Active stream subscriptions
    #[serde(default)]
    pub total_stream_subscriptions: Option<u64>,
}

/// Credentials for the managed message queue
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamingCredentials {
    /// Cloud project hosting the subscriptions
    pub project_id: String,
    /// Remaining credential fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Client for account-level endpoints
#[derive(Clone, Debug)]
pub struct AccountClient {
    client: ApiClient,
}

impl AccountClient {
    /// Create an account client over a shared transport
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetch current account limits
    pub async fn account_info(&self) -> Result<AccountInfo> {
        let url = self.client.endpoints().account();
        let body = self.client.get_json(&url).await?;
        let attributes = body
            .pointer("/data/attributes")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("account response has no attributes".into()))?;
        Ok(serde_json::from_value(attributes)?)
    }

    /// Fetch streaming credentials
    ///
    /// The service returns them as a JSON document embedded in a string attribute.
    pub async fn streaming_credentials(&self) -> Result<StreamingCredentials> {
        let url = self.client.endpoints().streaming_credentials();
        let body = self.client.get_json(&url).await?;
        let embedded = body
            .pointer("/data/attributes/streaming_credentials")
            .ok_or_else(|| Error::InvalidResponse("streaming credentials missing".into()))?;

        let credentials = match embedded {
            Value::String(raw) => serde_json::from_str(raw)?,
            other => serde_json::from_value(other.clone())?,
        };
        Ok(credentials)
    }
}
