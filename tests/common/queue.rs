//! Scripted in-memory message queue

use super::fixtures::news_payload;
use async_trait::async_trait;
use factiva_news::streams::{MessageQueue, QueueConnector, ReceivedMessage};
use factiva_news::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Ack id of every invalid message
pub const GARBAGE_ACK_ID: &str = "ack-garbage";

fn garbage() -> ReceivedMessage {
    ReceivedMessage {
        ack_id: GARBAGE_ACK_ID.into(),
        data: b"not json".to_vec(),
    }
}

/// What the next pull returns
#[derive(Clone, Debug)]
pub enum PullStep {
    /// Deliver as many fresh messages as requested
    Deliver,
    /// Deliver exactly this many fresh messages
    DeliverExactly(usize),
    /// Deliver one message whose payload is not a valid envelope
    Garbage,
    /// Redeliver the same invalid message on every pull until it is acknowledged
    GarbageUntilAcked,
    /// Fail the pull
    Fail,
}

/// Shared record of everything the consumer did against the queue
#[derive(Default)]
pub struct QueueState {
    /// Scripted pull outcomes; `Deliver` once the script runs out
    pub script: Mutex<VecDeque<PullStep>>,
    /// `max_messages` of every pull, in order
    pub pulls: Mutex<Vec<usize>>,
    /// Acknowledged ack ids, in order
    pub acks: Mutex<Vec<String>>,
    /// Number of connections opened
    pub connects: AtomicUsize,
    next_message: AtomicUsize,
}

impl QueueState {
    /// State with a pull script
    pub fn scripted(steps: Vec<PullStep>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    /// Pull sizes requested so far
    pub fn pull_sizes(&self) -> Vec<usize> {
        self.pulls.lock().unwrap().clone()
    }

    /// Ack ids received so far
    pub fn acked(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }

    /// Connections opened so far
    pub fn connections(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn fresh(&self, count: usize) -> Vec<ReceivedMessage> {
        (0..count)
            .map(|_| {
                let n = self.next_message.fetch_add(1, Ordering::SeqCst);
                ReceivedMessage {
                    ack_id: format!("ack-{n}"),
                    data: news_payload(n, "add"),
                }
            })
            .collect()
    }
}

/// Connector handing out queues backed by one [`QueueState`]
pub struct ScriptedConnector {
    /// Shared state
    pub state: Arc<QueueState>,
}

impl ScriptedConnector {
    /// Connector over `state`
    pub fn new(state: &Arc<QueueState>) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::clone(state),
        })
    }
}

#[async_trait]
impl QueueConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn MessageQueue>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedQueue {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedQueue {
    state: Arc<QueueState>,
}

#[async_trait]
impl MessageQueue for ScriptedQueue {
    async fn pull(&self, _subscription_path: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        self.state.pulls.lock().unwrap().push(max_messages);
        let step = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PullStep::Deliver);

        match step {
            PullStep::Fail => Err(Error::InvalidResponse("simulated pull failure".into())),
            PullStep::Deliver => Ok(self.state.fresh(max_messages)),
            PullStep::DeliverExactly(count) => Ok(self.state.fresh(count)),
            PullStep::Garbage => Ok(vec![garbage()]),
            PullStep::GarbageUntilAcked => {
                if self.state.acked().iter().any(|id| id == GARBAGE_ACK_ID) {
                    return Ok(self.state.fresh(max_messages));
                }
                self.state
                    .script
                    .lock()
                    .unwrap()
                    .push_front(PullStep::GarbageUntilAcked);
                Ok(vec![garbage()])
            }
        }
    }

    async fn acknowledge(&self, _subscription_path: &str, ack_ids: &[String]) -> Result<()> {
        self.state.acks.lock().unwrap().extend_from_slice(ack_ids);
        Ok(())
    }
}
