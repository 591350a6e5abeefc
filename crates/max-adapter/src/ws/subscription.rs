/*
[INPUT]:  Bus handler queue + caller-chosen delivery capacity
[OUTPUT]: Typed, bounded event stream with one-shot teardown
[POS]:    WebSocket layer - per-subscriber delivery
[UPDATE]: When changing backpressure or close semantics
*/

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::http::Result;
use crate::types::{AccountEvent, OrderBookEvent, StreamEvent, TickerEvent, TradeEvent};

use super::bus::{EventBus, HandlerId, HandlerQueue};
use super::topic::Topic;

/// Event types a [`Subscription`] can carry
pub trait StreamPayload: Sized + Send + 'static {
    fn from_event(event: StreamEvent) -> Option<Self>;
}

impl StreamPayload for TickerEvent {
    fn from_event(event: StreamEvent) -> Option<Self> {
        match event {
            StreamEvent::Ticker(ticker) => Some(ticker),
            _ => None,
        }
    }
}

impl StreamPayload for OrderBookEvent {
    fn from_event(event: StreamEvent) -> Option<Self> {
        match event {
            StreamEvent::OrderBook(book) => Some(book),
            _ => None,
        }
    }
}

impl StreamPayload for TradeEvent {
    fn from_event(event: StreamEvent) -> Option<Self> {
        match event {
            StreamEvent::Trade(trade) => Some(trade),
            _ => None,
        }
    }
}

impl StreamPayload for AccountEvent {
    fn from_event(event: StreamEvent) -> Option<Self> {
        match event {
            StreamEvent::Account(account) => Some(account),
            _ => None,
        }
    }
}

impl StreamPayload for StreamEvent {
    fn from_event(event: StreamEvent) -> Option<Self> {
        Some(event)
    }
}

/// Handle to one registered subscription.
///
/// A dedicated forwarding task moves events from the bus queue into a
/// bounded channel of the caller's chosen capacity. When that channel is
/// full only this forwarder waits; the read loop and other subscribers keep
/// running. Dropping the handle closes it.
///
/// Events published while the forwarder waits pile up in its unbounded bus
/// queue, so a handle that is never drained grows memory without limit. The
/// forwarder logs a warning each time that backlog doubles past
/// [`BACKLOG_WARN_THRESHOLD`]. Drain or close handles you stop reading.
#[derive(Debug)]
pub struct Subscription<T> {
    topic: Topic,
    handler_id: HandlerId,
    bus: Arc<EventBus>,
    rx: mpsc::Receiver<T>,
    forwarder: Option<JoinHandle<()>>,
    closed: bool,
}

impl<T: StreamPayload> Subscription<T> {
    /// Register on `bus` and start the forwarding task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(bus: Arc<EventBus>, topic: Topic, capacity: usize) -> Result<Self> {
        let (handler_id, queue) = bus.subscribe(&topic)?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let forwarder = tokio::spawn(forward(topic.clone(), queue, tx));

        Ok(Self {
            topic,
            handler_id,
            bus,
            rx,
            forwarder: Some(forwarder),
            closed: false,
        })
    }
}

impl<T> Subscription<T> {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    /// Whether the server acknowledged the subscribe command for this topic
    pub fn is_acknowledged(&self) -> bool {
        self.bus.is_acknowledged(&self.topic)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next event. Returns `None` once closed.
    ///
    /// Cancel safe, so it can be used as a `tokio::select!` branch.
    pub async fn recv(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Take the next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Deregister from the bus and close the delivery channel.
    ///
    /// Safe to call repeatedly; only the first call does anything. Buffered
    /// events are discarded and later reads return `None`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.bus.unsubscribe(&self.topic, self.handler_id);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        debug!(topic = %self.topic, handler = %self.handler_id, "subscription closed");
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bus backlog size that triggers the first slow-consumer warning
pub const BACKLOG_WARN_THRESHOLD: usize = 1024;

/// Fires once per doubling of a stalled subscriber's backlog
#[derive(Debug)]
struct BacklogAlarm {
    next: usize,
}

impl BacklogAlarm {
    fn new() -> Self {
        Self {
            next: BACKLOG_WARN_THRESHOLD,
        }
    }

    fn check(&mut self, backlog: usize) -> bool {
        if backlog < self.next {
            return false;
        }
        while self.next <= backlog {
            self.next = self.next.saturating_mul(2);
        }
        true
    }
}

async fn forward<T: StreamPayload>(topic: Topic, mut queue: HandlerQueue, tx: mpsc::Sender<T>) {
    let mut alarm = BacklogAlarm::new();
    while let Some(event) = queue.recv().await {
        let kind = event.kind();
        let Some(payload) = T::from_event(event) else {
            warn!(topic = %topic, kind, "dropping event of unexpected type");
            continue;
        };

        let payload = match tx.try_send(payload) {
            Ok(()) => continue,
            Err(mpsc::error::TrySendError::Closed(_)) => break,
            Err(mpsc::error::TrySendError::Full(payload)) => payload,
        };

        let backlog = queue.len();
        if alarm.check(backlog) {
            warn!(topic = %topic, backlog, "subscriber is not draining; events are queuing in memory");
        }
        if tx.send(payload).await.is_err() {
            break;
        }
    }
}
