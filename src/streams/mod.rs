//! Streams: continuous delivery of news changes through subscriptions
//!
//! - [`StreamClient`] creates, inspects and deletes streams and subscriptions
//! - [`StreamConsumer`] pulls bounded batches and feeds a [`MessageSink`]
//! - [`QuotaMonitor`] watches the account cap alongside the consumer

pub mod consumer;
pub mod message;
pub mod queue;
pub mod quota;
pub mod sink;
pub mod stream;
pub mod subscription;

pub use consumer::{ListenOptions, ListenOutcome, StreamConsumer};
pub use message::StreamMessage;
pub use queue::{MessageQueue, PubSubConnector, PubSubQueue, QueueConnector, ReceivedMessage};
pub use quota::{QuotaMonitor, QuotaMonitorHandle, QuotaSnapshot, STREAM_DISABLED_STATUS};
pub use sink::{ALLOWED_ACTIONS, FnSink, JsonlFileSink, MessageSink, stream_short_id};
pub use stream::{StreamClient, StreamInfo};
pub use subscription::{Subscription, subscription_to_stream_id};
