//! # factiva-news
//!
//! Client library for a news-data service: asynchronous snapshot jobs and
//! continuous change streams.
//!
//! ## Design Philosophy
//!
//! factiva-news is designed to be:
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//! - **Sensible defaults** - Poll cadence, batch sizes and backoff work out of the box
//! - **Cancellable** - Every long-running wait takes a `CancellationToken`
//! - **Event-driven** - Progress is published on an optional broadcast channel
//!
//! ## Quick Start
//!
//! ```no_run
//! use factiva_news::jobs::{ExplainJob, JobLifecycle, JobOutcome};
//! use factiva_news::{ApiClient, Config, UserKey};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = ApiClient::new(&config.api, UserKey::from_env()?)?;
//!
//!     let mut job = JobLifecycle::new(client, ExplainJob::new(), &config);
//!     let payload = serde_json::json!({"query": {"where": "language_code = 'en'"}});
//!     let cancel = CancellationToken::new();
//!
//!     if let JobOutcome::Completed { result, .. } = job.process(Some(&payload), &cancel).await? {
//!         println!("{result} matching documents");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Account key and account endpoints
pub mod account;
/// Authenticated HTTP transport and endpoint URLs
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Asynchronous job lifecycle engine and job variants
pub mod jobs;
/// Streams, subscriptions and message consumption
pub mod streams;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use account::{AccountClient, AccountInfo, StreamingCredentials, UserKey};
pub use client::{ApiClient, Endpoints};
pub use config::{ApiConfig, Config, DownloadConfig, JobConfig, ListenerConfig};
pub use error::{Error, Result, SubscriptionError};
pub use jobs::{
    AnalyticsJob, ExplainJob, ExtractionFiles, ExtractionJob, Job, JobLifecycle, JobOutcome,
    JobVariant, UpdateJob, UpdateSpec,
};
pub use streams::{
    JsonlFileSink, ListenOptions, ListenOutcome, MessageSink, QuotaMonitor, StreamClient,
    StreamConsumer, StreamMessage,
};
pub use types::{Event, JobKind, JobState, UpdateType};

use tokio_util::sync::CancellationToken;

/// Cancel `token` once the process receives a termination signal.
///
/// Pair with [`JobLifecycle::process`] or [`StreamConsumer::listen`] so that
/// Ctrl+C ends a wait with a `Cancelled` outcome instead of killing the task.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use factiva_news::cancel_on_shutdown;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let cancel = CancellationToken::new();
///     tokio::spawn(cancel_on_shutdown(cancel.clone()));
///     // hand `cancel` to process() / listen()
/// }
/// ```
pub async fn cancel_on_shutdown(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("shutdown signal received, cancelling");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_on_shutdown_returns_when_token_cancelled() {
        let token = CancellationToken::new();
        let task = tokio::spawn(cancel_on_shutdown(token.clone()));
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
