//! Per-execution event fan-out
//!
//! Every execution gets a topic backed by a bounded broadcast channel. A
//! subscriber joins by taking a snapshot of the latest status event and a
//! receiver under the same lock, so it sees that status first and every
//! later event after it. A subscriber that falls behind by more than the
//! buffer is disconnected; publishing never waits for anyone.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use futures::stream::{self, Stream};
use loadrig_config::HubConfig;
use loadrig_core::{ExecutionId, ExecutionStatus, ObserverEvent};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::HubError;

struct Topic {
    sender: Option<broadcast::Sender<ObserverEvent>>,
    last_status: ObserverEvent,
    next_seq: u64,
}

#[derive(Default)]
struct HubState {
    topics: HashMap<ExecutionId, Topic>,
    finished: VecDeque<ExecutionId>,
}

/// Fan-out of observer events, one topic per execution
pub struct EventHub {
    state: Mutex<HubState>,
    buffer: usize,
    retention: usize,
}

impl EventHub {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            buffer: config.subscriber_buffer.max(1),
            retention: config.finished_retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // Topic state stays consistent across a panicking holder
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the topic for an execution with its initial status
    pub fn open(&self, id: ExecutionId, status: ExecutionStatus) -> Result<(), HubError> {
        let mut state = self.lock();
        if state.topics.contains_key(&id) {
            return Err(HubError::AlreadyOpen(id));
        }
        let (sender, _) = broadcast::channel(self.buffer);
        let mut initial = ObserverEvent::status(id, status);
        initial.seq = 1;
        state.topics.insert(
            id,
            Topic {
                sender: Some(sender),
                last_status: initial,
                next_seq: 2,
            },
        );
        debug!("Opened event topic for execution {}", id);
        Ok(())
    }

    /// Stamp `event` with the next sequence number and fan it out
    pub fn publish(&self, mut event: ObserverEvent) -> Result<u64, HubError> {
        let id = event.execution_id;
        let mut state = self.lock();
        let topic = state
            .topics
            .get_mut(&id)
            .ok_or(HubError::UnknownExecution(id))?;
        let Some(sender) = topic.sender.as_ref() else {
            return Err(HubError::Closed(id));
        };

        event.seq = topic.next_seq;
        topic.next_seq += 1;
        let seq = event.seq;
        if event.status_value().is_some() {
            topic.last_status = event.clone();
        }

        match sender.send(event) {
            Ok(receivers) => debug!(
                "Published event {} for execution {} to {} subscribers",
                seq, id, receivers
            ),
            Err(_) => debug!("No subscribers for execution {} event {}", id, seq),
        }
        Ok(seq)
    }

    /// Join an execution's stream
    pub fn subscribe(&self, id: ExecutionId) -> Result<Subscription, HubError> {
        let state = self.lock();
        let topic = state
            .topics
            .get(&id)
            .ok_or(HubError::UnknownExecution(id))?;
        let receiver = topic.sender.as_ref().map(|s| s.subscribe());
        Ok(Subscription::new(topic.last_status.clone(), receiver))
    }

    /// Close a topic, keeping only its last status for late joiners
    pub fn close(&self, id: ExecutionId) -> Result<(), HubError> {
        let mut state = self.lock();
        let topic = state
            .topics
            .get_mut(&id)
            .ok_or(HubError::UnknownExecution(id))?;
        if topic.sender.take().is_none() {
            return Ok(());
        }
        state.finished.push_back(id);
        while state.finished.len() > self.retention {
            if let Some(evicted) = state.finished.pop_front() {
                state.topics.remove(&evicted);
                debug!("Evicted finished topic for execution {}", evicted);
            }
        }
        debug!("Closed event topic for execution {}", id);
        Ok(())
    }

    /// Live subscribers of an execution
    pub fn subscriber_count(&self, id: ExecutionId) -> usize {
        self.lock()
            .topics
            .get(&id)
            .and_then(|t| t.sender.as_ref())
            .map_or(0, |s| s.receiver_count())
    }

    /// Whether the hub still knows the execution, open or finished
    pub fn contains(&self, id: ExecutionId) -> bool {
        self.lock().topics.contains_key(&id)
    }
}

/// One observer's view of an execution's stream
///
/// Yields the status snapshot taken at subscribe time, then live events,
/// and ends after the terminal status. Dropping it has no effect on the
/// execution.
pub struct Subscription {
    snapshot: Option<ObserverEvent>,
    receiver: Option<broadcast::Receiver<ObserverEvent>>,
    last_seq: u64,
    done: bool,
}

impl Subscription {
    fn new(snapshot: ObserverEvent, receiver: Option<broadcast::Receiver<ObserverEvent>>) -> Self {
        Self {
            snapshot: Some(snapshot),
            receiver,
            last_seq: 0,
            done: false,
        }
    }

    /// A subscription that yields one status event and ends
    pub fn finished(event: ObserverEvent) -> Self {
        Self::new(event, None)
    }

    /// Next event, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<ObserverEvent> {
        if self.done {
            return None;
        }
        if let Some(event) = self.snapshot.take() {
            return Some(self.deliver(event));
        }

        let receiver = match self.receiver.as_mut() {
            Some(receiver) => receiver,
            None => {
                self.done = true;
                return None;
            }
        };
        loop {
            match receiver.recv().await {
                Ok(event) if event.seq <= self.last_seq => continue,
                Ok(event) => return Some(self.deliver(event)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        "Subscriber fell {} events behind, disconnecting",
                        missed
                    );
                    self.done = true;
                    return None;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }

    fn deliver(&mut self, event: ObserverEvent) -> ObserverEvent {
        self.last_seq = event.seq;
        if event.is_terminal_status() || self.receiver.is_none() {
            self.done = true;
        }
        event
    }

    pub fn into_stream(self) -> impl Stream<Item = ObserverEvent> + Send {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}
