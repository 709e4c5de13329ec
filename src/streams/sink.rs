//! Pluggable message sinks

use super::message::StreamMessage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;

/// Actions accepted by [`JsonlFileSink`]
pub const ALLOWED_ACTIONS: &[&str] = &["add", "rep", "del", "delete", "replace"];

/// Consumes one decoded message
///
/// Returning `false` tells the consumer to stop; the message is then neither
/// acknowledged nor counted.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Handle `message` received on `subscription_id`
    async fn save(&self, message: &StreamMessage, subscription_id: &str) -> bool;
}

/// Adapts a synchronous closure into a [`MessageSink`]
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(&StreamMessage, &str) -> bool + Send + Sync,
{
    /// Wrap `f`
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> MessageSink for FnSink<F>
where
    F: Fn(&StreamMessage, &str) -> bool + Send + Sync,
{
    async fn save(&self, message: &StreamMessage, subscription_id: &str) -> bool {
        (self.f)(message, subscription_id)
    }
}

/// Appends messages to hourly JSON Lines files, one per stream and action
///
/// Files are named `{stream_short_id}_{action}_{YYYYMMDDHH}.jsonl`. Messages
/// with an unknown action, and messages without one, are appended to
/// `errors.log` instead; the latter also stop consumption.
#[derive(Debug)]
pub struct JsonlFileSink {
    folder: PathBuf,
    written: AtomicUsize,
}

impl JsonlFileSink {
    /// Write into `folder`, creating it on first use
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            written: AtomicUsize::new(0),
        }
    }

    /// Output folder
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Messages accepted so far, including ones routed to `errors.log`
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    async fn append(&self, file_name: &str, line: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.folder.join(file_name))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    async fn log_error(&self, kind: &str, message: &StreamMessage) -> std::io::Result<()> {
        let line = format!(
            "{}\tERR\t{}\t{}\n",
            chrono::Utc::now().timestamp_millis(),
            kind,
            serde_json::to_string(message).unwrap_or_default()
        );
        self.append("errors.log", &line).await
    }
}

/// Third segment from the end of a subscription id
pub fn stream_short_id(subscription_id: &str) -> &str {
    let parts: Vec<&str> = subscription_id.split('-').collect();
    if parts.len() >= 3 {
        parts[parts.len() - 3]
    } else {
        subscription_id
    }
}

#[async_trait]
impl MessageSink for JsonlFileSink {
    async fn save(&self, message: &StreamMessage, subscription_id: &str) -> bool {
        let Some(action) = message.action() else {
            if let Err(e) = self.log_error("InvalidMessage", message).await {
                tracing::error!(error = %e, "failed to write errors.log");
            }
            return false;
        };

        let result = if ALLOWED_ACTIONS.contains(&action) {
            let file_name = format!(
                "{}_{}_{}.jsonl",
                stream_short_id(subscription_id),
                action,
                chrono::Utc::now().format("%Y%m%d%H")
            );
            match serde_json::to_string(&message.attributes) {
                Ok(json) => self.append(&file_name, &format!("{json}\n")).await,
                Err(e) => Err(std::io::Error::other(e)),
            }
        } else {
            self.log_error("InvalidAction", message).await
        };

        match result {
            Ok(()) => {
                let total = self.written.fetch_add(1, Ordering::Relaxed) + 1;
                if total % 100 == 0 {
                    tracing::info!(total, folder = %self.folder.display(), "messages written");
                }
                true
            }
            Err(e) => {
                tracing::error!(error = %e, folder = %self.folder.display(), "failed to write message");
                false
            }
        }
    }
}
