/*
[INPUT]:  Inbound text frames from the read loop
[OUTPUT]: Events published to the bus, auth answers to send back
[POS]:    WebSocket layer - inbound classification and dispatch
[UPDATE]: When adding message kinds or changing routing rules
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::types::StreamEvent;

use super::bus::EventBus;
use super::handshake::Handshake;
use super::message::{Command, InboundMessage};
use super::topic::{Channel, Topic};

const UNHANDLED_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static UNHANDLED_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
pub(crate) struct Router {
    bus: Arc<EventBus>,
    handshake: Handshake,
}

impl Router {
    pub(crate) fn new(bus: Arc<EventBus>, handshake: Handshake) -> Self {
        Self { bus, handshake }
    }

    pub(crate) fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Handle one text frame. Returns a command to send back, if any.
    pub(crate) fn route(&self, text: &str) -> Option<Command> {
        match InboundMessage::parse(text) {
            Ok(message) => self.dispatch(message),
            Err(err) => {
                log_parse_fail_once(&err, text);
                None
            }
        }
    }

    pub(crate) fn dispatch(&self, message: InboundMessage) -> Option<Command> {
        match message {
            InboundMessage::Challenge { msg } => return self.handshake.on_challenge(msg.as_deref()),
            InboundMessage::Authenticated => self.handshake.on_authenticated(),
            InboundMessage::Subscribed { channel, market } => {
                let mut params = Map::new();
                params.insert("market".to_string(), market);
                let topic = Topic::new(&channel, &params);
                info!(topic = %topic, "ws subscription acknowledged");
                self.bus.acknowledge(topic);
            }
            InboundMessage::Account(event) => {
                self.publish(Topic::account(), StreamEvent::Account(event));
            }
            InboundMessage::Ticker(event) => {
                let topic = Topic::market(Channel::Ticker, &event.market);
                self.publish(topic, StreamEvent::Ticker(event));
            }
            InboundMessage::OrderBook(event) => {
                let topic = Topic::market(Channel::OrderBook, &event.market);
                self.publish(topic, StreamEvent::OrderBook(event));
            }
            InboundMessage::Trade(event) => {
                let topic = Topic::market(Channel::Trade, &event.market);
                self.publish(topic, StreamEvent::Trade(event));
            }
            InboundMessage::Unknown { info, raw } => log_unhandled_once(info.as_deref(), &raw),
        }
        None
    }

    /// Record that a command produced by `route` reached the wire
    pub(crate) fn command_sent(&self, command: &Command) {
        if matches!(command, Command::Auth { .. }) {
            self.handshake.on_answer_sent();
        }
    }

    /// The read loop ended; refuse new registrations
    pub(crate) fn on_disconnect(&self) {
        self.bus.close();
    }

    fn publish(&self, topic: Topic, event: StreamEvent) {
        let delivered = self.bus.publish(&topic, event);
        if delivered == 0 {
            debug!(topic = %topic, "ws event without subscribers");
        }
    }
}

fn log_unhandled_once(info: Option<&str>, raw: &Value) {
    let count = UNHANDLED_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNHANDLED_LOG_LIMIT {
        let raw = raw.to_string();
        info!(
            sample_index = count + 1,
            sample_limit = UNHANDLED_LOG_LIMIT,
            info = info.unwrap_or("<missing>"),
            bytes = raw.len(),
            "ws message unhandled"
        );
        let preview = truncate_for_log(&raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNHANDLED_LOG_LIMIT,
            message = %preview,
            "ws message unhandled"
        );
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws message parse failed"
        );
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
