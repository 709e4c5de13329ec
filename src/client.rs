//! HTTP transport shared by jobs, streams and the account client
//!
//! [`ApiClient`] owns a pooled `reqwest::Client`, the API host and the
//! account's [`UserKey`]. Every request carries the `user-key` header.
//! Non-success statuses become [`Error::Http`] with the response body attached.

use crate::account::UserKey;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Header carrying the account key on every request
pub const USER_KEY_HEADER: &str = "user-key";

/// Response bodies longer than this are truncated inside error messages
const MAX_ERROR_BODY_LEN: usize = 2048;

const SNAPSHOTS_BASEPATH: &str = "/alpha/extractions/documents";
const EXTRACTIONS_BASEPATH: &str = "/alpha/extractions";
const EXPLAIN_SUFFIX: &str = "/_explain";
const SAMPLES_SUFFIX: &str = "/samples";
const ANALYTICS_BASEPATH: &str = "/alpha/analytics";
const STREAMS_BASEPATH: &str = "/alpha/streams";
const ACCOUNTS_BASEPATH: &str = "/alpha/accounts";
const STREAMING_CREDENTIALS_PATH: &str = "/alpha/accounts/streaming-credentials";

/// Prefix of server-side extraction identifiers
const EXTRACTION_ID_PREFIX: &str = "dj-synhub-extraction";

/// URL builder for the news data service
#[derive(Clone, Debug)]
pub struct Endpoints {
    host: String,
    key: String,
}

impl Endpoints {
    /// Build endpoints for a host and account key
    pub fn new(host: &str, user_key: &UserKey) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            key: user_key.as_str().to_string(),
        }
    }

    /// Snapshot (extraction) creation endpoint
    pub fn snapshots(&self) -> String {
        format!("{}{}", self.host, SNAPSHOTS_BASEPATH)
    }

    /// Explain creation endpoint
    pub fn explain(&self) -> String {
        format!("{}{}{}", self.host, SNAPSHOTS_BASEPATH, EXPLAIN_SUFFIX)
    }

    /// Explain samples endpoint
    pub fn samples(&self) -> String {
        format!("{}{}{}", self.host, EXTRACTIONS_BASEPATH, SAMPLES_SUFFIX)
    }

    /// Analytics creation endpoint
    pub fn analytics(&self) -> String {
        format!("{}{}", self.host, ANALYTICS_BASEPATH)
    }

    /// Streams collection endpoint
    pub fn streams(&self) -> String {
        format!("{}{}", self.host, STREAMS_BASEPATH)
    }

    /// Single stream endpoint
    pub fn stream(&self, stream_id: &str) -> String {
        format!("{}{}/{}", self.host, STREAMS_BASEPATH, stream_id)
    }

    /// Account details endpoint
    pub fn account(&self) -> String {
        format!("{}{}/{}", self.host, ACCOUNTS_BASEPATH, self.key)
    }

    /// Streaming credentials endpoint
    pub fn streaming_credentials(&self) -> String {
        format!("{}{}", self.host, STREAMING_CREDENTIALS_PATH)
    }

    /// Status link of an existing extraction, e.g. a snapshot or update id
    pub fn extraction_link(&self, id: &str) -> String {
        format!(
            "{}{}/{}-{}-{}",
            self.host, SNAPSHOTS_BASEPATH, EXTRACTION_ID_PREFIX, self.key, id
        )
    }

    /// Update creation endpoint for a snapshot
    pub fn update(&self, snapshot_id: &str, update_type: &str) -> String {
        format!(
            "{}{}/{}-{}-{}/{}",
            self.host, EXTRACTIONS_BASEPATH, EXTRACTION_ID_PREFIX, self.key, snapshot_id, update_type
        )
    }

    /// Stream creation endpoint seeded from a snapshot
    pub fn snapshot_streams(&self, snapshot_id: &str) -> String {
        format!("{}{}/{}/streams", self.host, SNAPSHOTS_BASEPATH, snapshot_id)
    }
}

/// Authenticated HTTP client (cloneable; clones share the connection pool)
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    user_key: UserKey,
}

impl ApiClient {
    /// Create a client for the configured host
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ApiConfig, user_key: UserKey) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("factiva-news/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoints: Endpoints::new(&config.host, &user_key),
            user_key,
        })
    }

    /// URL builder bound to this client's host and key
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Account key used for authentication
    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    /// POST a JSON payload (or an empty body) and decode the JSON response
    pub async fn post_json(&self, url: &str, payload: Option<&Value>) -> Result<Value> {
        let mut request = self
            .http
            .post(url)
            .header(USER_KEY_HEADER, self.user_key.as_str());
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::decode(url, response).await
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        self.get_json_with_query(url, &[]).await
    }

    /// GET a JSON document with query-string parameters
    pub async fn get_json_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .header(USER_KEY_HEADER, self.user_key.as_str())
            .query(query)
            .send()
            .await?;
        Self::decode(url, response).await
    }

    /// DELETE a resource; an empty response body decodes to `Value::Null`
    pub async fn delete_json(&self, url: &str) -> Result<Value> {
        let response = self
            .http
            .delete(url)
            .header(USER_KEY_HEADER, self.user_key.as_str())
            .send()
            .await?;
        Self::decode(url, response).await
    }

    /// Stream a remote file to `destination`, returning the number of bytes written
    ///
    /// A partially written file is left in place when the transfer fails.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let mut response = self
            .http
            .get(url)
            .header(USER_KEY_HEADER, self.user_key.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status.as_u16(), url, body));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url = %url, path = %destination.display(), bytes = written, "file downloaded");
        Ok(written)
    }

    async fn decode(url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(http_error(status.as_u16(), url, body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn http_error(status: u16, url: &str, mut body: String) -> Error {
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Error::Http {
        status,
        url: url.to_string(),
        body,
    }
}
