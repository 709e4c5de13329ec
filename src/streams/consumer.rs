//! Bounded pull/ack consumption of one subscription
//!
//! [`StreamConsumer::listen`] pulls batches until the message budget is
//! spent, hands each decoded record to a [`MessageSink`] and acknowledges it
//! afterwards (when enabled). Undecodable payloads are logged, acknowledged
//! when acks are on, and skipped without counting. Failed cycles are logged,
//! followed by a fixed backoff and a fresh queue connection; they never end
//! the session.

use super::message::StreamMessage;
use super::queue::{MessageQueue, QueueConnector};
use super::quota::QuotaSnapshot;
use super::sink::MessageSink;
use super::subscription::subscription_to_stream_id;
use crate::account::AccountClient;
use crate::config::ListenerConfig;
use crate::error::{Error, Result};
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Per-session listen settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenOptions {
    /// Acknowledge each message after the sink accepted it
    pub ack_enabled: bool,
    /// Session budget; listening ends once this many messages were processed
    pub maximum_messages: usize,
    /// Upper bound for a single pull
    pub batch_size: usize,
}

impl ListenOptions {
    /// Options for a session of `maximum_messages`, without acks and with the default batch size
    pub fn new(maximum_messages: usize) -> Self {
        Self::from_config(&ListenerConfig::default(), maximum_messages)
    }

    /// Options for a session of `maximum_messages` using the configured batch size
    pub fn from_config(config: &ListenerConfig, maximum_messages: usize) -> Self {
        Self {
            ack_enabled: false,
            maximum_messages,
            batch_size: config.batch_size,
        }
    }

    /// Enable or disable acknowledgement
    pub fn with_ack(mut self, ack_enabled: bool) -> Self {
        self.ack_enabled = ack_enabled;
        self
    }

    /// Set the pull batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// How a listen session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenOutcome {
    /// The message budget was reached
    Completed {
        /// Messages processed in the session
        messages: usize,
    },
    /// The sink asked to stop
    StoppedBySink {
        /// Messages processed before the stop
        messages: usize,
    },
    /// The cancellation token fired
    Cancelled {
        /// Messages processed before cancellation
        messages: usize,
    },
}

impl ListenOutcome {
    /// Messages processed in the session
    pub fn messages(&self) -> usize {
        match self {
            ListenOutcome::Completed { messages }
            | ListenOutcome::StoppedBySink { messages }
            | ListenOutcome::Cancelled { messages } => *messages,
        }
    }
}

enum Cycle {
    Continue,
    StoppedBySink,
    Cancelled,
}

/// Consumes one subscription
pub struct StreamConsumer {
    subscription_id: String,
    project_id: String,
    connector: Arc<dyn QueueConnector>,
    listener: ListenerConfig,
    messages_count: usize,
    quota: Option<watch::Receiver<Option<QuotaSnapshot>>>,
    events: Option<broadcast::Sender<Event>>,
    span: tracing::Span,
}

impl StreamConsumer {
    /// Create a consumer with a known project id
    pub fn new(
        subscription_id: impl Into<String>,
        project_id: impl Into<String>,
        connector: Arc<dyn QueueConnector>,
    ) -> Self {
        let subscription_id = subscription_id.into();
        let span = tracing::info_span!("stream_consumer", subscription_id = %subscription_id);
        Self {
            subscription_id,
            project_id: project_id.into(),
            connector,
            listener: ListenerConfig::default(),
            messages_count: 0,
            quota: None,
            events: None,
            span,
        }
    }

    /// Create a consumer, resolving the project id from the account's streaming credentials
    pub async fn for_subscription(
        account: &AccountClient,
        subscription_id: impl Into<String>,
        connector: Arc<dyn QueueConnector>,
        config: &ListenerConfig,
    ) -> Result<Self> {
        let credentials = account.streaming_credentials().await?;
        Ok(Self::new(subscription_id, credentials.project_id, connector)
            .with_listener_config(config.clone()))
    }

    /// Take batch size and backoff from `config`
    pub fn with_listener_config(mut self, config: ListenerConfig) -> Self {
        self.listener = config;
        self
    }

    /// Listen options for a session of `maximum_messages` with the configured batch size
    pub fn options(&self, maximum_messages: usize) -> ListenOptions {
        ListenOptions::from_config(&self.listener, maximum_messages)
    }

    /// Override the pause before retrying a failed cycle
    pub fn with_pull_backoff(mut self, backoff: Duration) -> Self {
        self.listener.pull_backoff = backoff;
        self
    }

    /// Observe quota snapshots from a running [`QuotaMonitor`](super::QuotaMonitor)
    pub fn with_quota(mut self, quota: watch::Receiver<Option<QuotaSnapshot>>) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Publish progress events on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run all logging inside `span`
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Subscription consumed from
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Cloud project hosting the subscription
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Messages processed in the current (or last) session
    pub fn messages_count(&self) -> usize {
        self.messages_count
    }

    /// Fully qualified subscription path
    pub fn subscription_path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.project_id, self.subscription_id
        )
    }

    /// Stream owning the subscription
    pub fn stream_id(&self) -> Result<String> {
        subscription_to_stream_id(&self.subscription_id)
    }

    /// Latest quota snapshot, if a monitor is attached and has reported
    pub fn quota(&self) -> Option<QuotaSnapshot> {
        self.quota.as_ref().and_then(|rx| rx.borrow().clone())
    }

    /// Consume until `maximum_messages` were processed, the sink stops or `cancel` fires
    ///
    /// Each call starts a new session with a zero message count.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty project or subscription id, or a
    /// zero budget or batch size. Pull and ack failures are retried, not returned.
    pub async fn listen(
        &mut self,
        sink: &dyn MessageSink,
        options: ListenOptions,
        cancel: &CancellationToken,
    ) -> Result<ListenOutcome> {
        if self.project_id.trim().is_empty() {
            return Err(Error::InvalidArgument("project id is not set".into()));
        }
        if self.subscription_id.trim().is_empty() {
            return Err(Error::InvalidArgument("subscription id is not set".into()));
        }
        if options.maximum_messages == 0 {
            return Err(Error::InvalidArgument(
                "maximum_messages must be greater than zero".into(),
            ));
        }
        if options.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be greater than zero".into(),
            ));
        }

        let span = self.span.clone();
        async {
            self.messages_count = 0;
            let path = self.subscription_path();
            let mut queue: Option<Box<dyn MessageQueue>> = None;
            tracing::info!(
                maximum_messages = options.maximum_messages,
                batch_size = options.batch_size,
                ack_enabled = options.ack_enabled,
                "listening for messages"
            );

            while self.messages_count < options.maximum_messages {
                if cancel.is_cancelled() {
                    return Ok(self.cancelled());
                }

                match self.cycle(&mut queue, sink, &path, &options, cancel).await {
                    Ok(Cycle::Continue) => {}
                    Ok(Cycle::StoppedBySink) => {
                        tracing::info!(messages = self.messages_count, "sink requested stop");
                        return Ok(ListenOutcome::StoppedBySink {
                            messages: self.messages_count,
                        });
                    }
                    Ok(Cycle::Cancelled) => return Ok(self.cancelled()),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            transport = e.is_transport(),
                            backoff_secs = self.listener.pull_backoff.as_secs_f64(),
                            "pull cycle failed, reconnecting after backoff"
                        );
                        queue = None;
                        tokio::select! {
                            _ = cancel.cancelled() => return Ok(self.cancelled()),
                            _ = tokio::time::sleep(self.listener.pull_backoff) => {}
                        }
                    }
                }
            }

            tracing::info!(messages = self.messages_count, "message budget reached");
            Ok(ListenOutcome::Completed {
                messages: self.messages_count,
            })
        }
        .instrument(span)
        .await
    }

    fn cancelled(&self) -> ListenOutcome {
        tracing::info!(messages = self.messages_count, "listening cancelled");
        ListenOutcome::Cancelled {
            messages: self.messages_count,
        }
    }

    async fn cycle(
        &mut self,
        queue: &mut Option<Box<dyn MessageQueue>>,
        sink: &dyn MessageSink,
        path: &str,
        options: &ListenOptions,
        cancel: &CancellationToken,
    ) -> Result<Cycle> {
        let queue = match queue {
            Some(queue) => queue,
            None => queue.insert(self.connector.connect().await?),
        };

        let remaining = options.maximum_messages - self.messages_count;
        let batch = options.batch_size.min(remaining);
        let received = tokio::select! {
            _ = cancel.cancelled() => return Ok(Cycle::Cancelled),
            pulled = queue.pull(path, batch) => pulled?,
        };
        tracing::debug!(requested = batch, received = received.len(), "pulled batch");

        let mut processed = 0usize;
        for message in received.into_iter().take(remaining) {
            if cancel.is_cancelled() {
                return Ok(Cycle::Cancelled);
            }

            let record = match StreamMessage::decode(&message.data) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        ack_id = %message.ack_id,
                        error = %e,
                        "skipping undecodable message"
                    );
                    if options.ack_enabled {
                        queue
                            .acknowledge(path, std::slice::from_ref(&message.ack_id))
                            .await?;
                    }
                    continue;
                }
            };
            if !sink.save(&record, &self.subscription_id).await {
                return Ok(Cycle::StoppedBySink);
            }
            if options.ack_enabled {
                queue
                    .acknowledge(path, std::slice::from_ref(&message.ack_id))
                    .await?;
            }
            self.messages_count += 1;
            processed += 1;
        }

        if processed > 0 {
            self.report_progress();
        }
        Ok(Cycle::Continue)
    }

    fn report_progress(&mut self) {
        if let Some(quota) = self.quota.as_mut()
            && quota.has_changed().unwrap_or(false)
            && quota.borrow_and_update().as_ref().is_some_and(|s| s.is_disabled)
        {
            tracing::warn!("stream is disabled by the account quota; draining already queued messages");
        }
        if let Some(events) = &self.events {
            events
                .send(Event::MessagesProcessed {
                    subscription_id: self.subscription_id.clone(),
                    total: self.messages_count,
                })
                .ok();
        }
    }
}
