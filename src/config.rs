//! Configuration types for factiva-news

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the default subscription id for listeners
pub const SUBSCRIPTION_ID_ENV: &str = "FACTIVA_STREAM_SUBSCRIPTION_ID";

/// API host and transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the news data service (default: "https://api.dowjones.com")
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Timeout applied to every HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Job polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Constant wait between status polls (default: 10 seconds)
    ///
    /// Polling has no attempt limit; jobs may legitimately run for hours.
    /// Use the cancellation token passed to `process()` to stop waiting.
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

/// Result file download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum number of files fetched concurrently (default: 8)
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_max_concurrent_files(),
        }
    }
}

/// Stream listener settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Base URL of the Pub/Sub REST service (default: "https://pubsub.googleapis.com")
    #[serde(default = "default_pubsub_host")]
    pub pubsub_host: String,

    /// Messages requested per pull (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fixed pause before retrying a failed pull/ack cycle (default: 10 seconds)
    #[serde(default = "default_pull_backoff", with = "duration_serde")]
    pub pull_backoff: Duration,

    /// Interval between account quota checks (default: 300 seconds)
    #[serde(default = "default_quota_check_interval", with = "duration_serde")]
    pub quota_check_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            pubsub_host: default_pubsub_host(),
            batch_size: default_batch_size(),
            pull_backoff: default_pull_backoff(),
            quota_check_interval: default_quota_check_interval(),
        }
    }
}

impl ListenerConfig {
    /// Read the subscription id from `FACTIVA_STREAM_SUBSCRIPTION_ID`
    pub fn subscription_from_env() -> Result<String> {
        match std::env::var(SUBSCRIPTION_ID_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(Error::Config {
                message: "subscription id is not set".to_string(),
                key: Some(SUBSCRIPTION_ID_ENV.to_string()),
            }),
        }
    }
}

/// Main configuration for factiva-news clients
///
/// Groups settings into sub-configs:
/// - [`api`](ApiConfig): host and request timeout
/// - [`jobs`](JobConfig): poll cadence
/// - [`downloads`](DownloadConfig): file fan-out
/// - [`listener`](ListenerConfig): pull batching, backoff, quota checks
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// API host and transport settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Job polling settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// Result file download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Stream listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
}

impl Config {
    /// Reject values that would make the clients misbehave
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.api.host).is_err() {
            return Err(Error::Config {
                message: format!("invalid API host: {}", self.api.host),
                key: Some("api.host".to_string()),
            });
        }
        if url::Url::parse(&self.listener.pubsub_host).is_err() {
            return Err(Error::Config {
                message: format!("invalid Pub/Sub host: {}", self.listener.pubsub_host),
                key: Some("listener.pubsub_host".to_string()),
            });
        }
        if self.downloads.max_concurrent_files == 0 {
            return Err(Error::Config {
                message: "max_concurrent_files must be at least 1".to_string(),
                key: Some("downloads.max_concurrent_files".to_string()),
            });
        }
        if self.listener.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
                key: Some("listener.batch_size".to_string()),
            });
        }
        Ok(())
    }
}

fn default_api_host() -> String {
    "https://api.dowjones.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent_files() -> usize {
    8
}

fn default_pubsub_host() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_pull_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_quota_check_interval() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
