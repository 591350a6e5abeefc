/*
[INPUT]:  Topic registrations and published stream events
[OUTPUT]: Per-handler event queues fed without blocking the publisher
[POS]:    WebSocket layer - topic registry and event fan-out
[UPDATE]: When changing delivery semantics or registry locking
*/

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::http::{MaxError, Result};
use crate::types::StreamEvent;

use super::topic::Topic;

/// Identity of one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Receiving side of a handler registration.
///
/// Events arrive in publish order. The queue is unbounded so publishing
/// never waits on a slow consumer.
pub type HandlerQueue = mpsc::UnboundedReceiver<StreamEvent>;

type HandlerSender = mpsc::UnboundedSender<StreamEvent>;

/// Topic registry with asynchronous fan-out
#[derive(Debug, Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<Topic, Vec<(HandlerId, HandlerSender)>>>,
    acknowledged: RwLock<HashSet<Topic>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new handler under `topic`.
    ///
    /// Fails with [`MaxError::ConnectionClosed`] once the bus is closed.
    pub fn subscribe(&self, topic: &Topic) -> Result<(HandlerId, HandlerQueue)> {
        if self.is_closed() {
            return Err(MaxError::ConnectionClosed);
        }

        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        write_lock(&self.handlers)
            .entry(topic.clone())
            .or_default()
            .push((id, tx));

        debug!(topic = %topic, handler = %id, "bus handler registered");
        Ok((id, rx))
    }

    /// Remove one handler. Returns false if it was already gone.
    pub fn unsubscribe(&self, topic: &Topic, id: HandlerId) -> bool {
        let mut handlers = write_lock(&self.handlers);
        let Some(entries) = handlers.get_mut(topic) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            handlers.remove(topic);
        }

        if removed {
            debug!(topic = %topic, handler = %id, "bus handler removed");
        }
        removed
    }

    /// Queue `event` for every handler registered under `topic`.
    ///
    /// Returns the number of handlers the event was queued for.
    pub fn publish(&self, topic: &Topic, event: StreamEvent) -> usize {
        let handlers = read_lock(&self.handlers);
        let Some(entries) = handlers.get(topic) else {
            return 0;
        };

        entries
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn handler_count(&self, topic: &Topic) -> usize {
        read_lock(&self.handlers).get(topic).map_or(0, Vec::len)
    }

    /// Record a server `subscribed` acknowledgment for `topic`
    pub fn acknowledge(&self, topic: Topic) {
        write_lock(&self.acknowledged).insert(topic);
    }

    pub fn is_acknowledged(&self, topic: &Topic) -> bool {
        read_lock(&self.acknowledged).contains(topic)
    }

    /// Refuse new registrations. Existing handlers stay registered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
