//! Bounded, coalescing re-evaluation queue between producers (connectors,
//! governance polling) and the risk pipeline.
//!
//! An upgrade id already waiting in the queue is not queued again; only one
//! pending request per id survives. Once the consumer takes an id, a new
//! request for it queues normally. Producers never wait: a full queue drops
//! its oldest request. The dropped upgrade's events are already stored, so
//! its next trigger re-evaluates from the full history.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::domain::id::UpgradeId;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Queued {
    Added,
    /// Already pending; merged into the waiting request.
    Coalesced,
    /// Added after dropping the oldest request to stay within capacity.
    Displaced(UpgradeId),
}

#[derive(Default)]
struct State {
    queue: VecDeque<UpgradeId>,
    pending: HashSet<UpgradeId>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    ready: Notify,
    capacity: usize,
    senders: AtomicUsize,
}

pub struct TriggerSender {
    shared: Arc<Shared>,
}

pub struct TriggerReceiver {
    shared: Arc<Shared>,
}

#[must_use]
pub fn trigger_queue(capacity: usize) -> (TriggerSender, TriggerReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        ready: Notify::new(),
        capacity: capacity.max(1),
        senders: AtomicUsize::new(1),
    });
    (
        TriggerSender {
            shared: Arc::clone(&shared),
        },
        TriggerReceiver { shared },
    )
}

impl TriggerSender {
    /// Request re-evaluation of `upgrade`. Never waits.
    ///
    /// # Errors
    ///
    /// [`Error::Shutdown`] once the receiver is gone.
    pub fn push(&self, upgrade: UpgradeId) -> Result<Queued, Error> {
        let outcome = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(Error::Shutdown);
            }
            if state.pending.contains(&upgrade) {
                return Ok(Queued::Coalesced);
            }
            let displaced = if state.queue.len() >= self.shared.capacity {
                state.queue.pop_front()
            } else {
                None
            };
            if let Some(old) = &displaced {
                state.pending.remove(old);
            }
            state.pending.insert(upgrade.clone());
            state.queue.push_back(upgrade);
            displaced.map_or(Queued::Added, Queued::Displaced)
        };
        if let Queued::Displaced(old) = &outcome {
            warn!(dropped = %old, capacity = self.shared.capacity, "Trigger queue full, oldest request dropped");
        }
        self.shared.ready.notify_one();
        Ok(outcome)
    }

    /// Requests waiting to be consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }
}

impl Clone for TriggerSender {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::SeqCst);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for TriggerSender {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.ready.notify_one();
        }
    }
}

impl TriggerReceiver {
    /// Next upgrade to re-evaluate; `None` once closed, or when every sender
    /// is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<UpgradeId> {
        loop {
            let notified = self.shared.ready.notified();
            {
                let mut state = self.shared.state.lock();
                if let Some(upgrade) = state.queue.pop_front() {
                    state.pending.remove(&upgrade);
                    return Some(upgrade);
                }
                if state.closed || self.shared.senders.load(Ordering::SeqCst) == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn close(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.queue.clear();
        state.pending.clear();
    }
}

impl Drop for TriggerReceiver {
    fn drop(&mut self) {
        self.close();
    }
}
