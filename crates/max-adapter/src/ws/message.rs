/*
[INPUT]:  Raw WebSocket text frames / outbound command values
[OUTPUT]: Classified InboundMessage values and serialized commands
[POS]:    WebSocket layer - message parsing and command encoding
[UPDATE]: When adding new message kinds or changing command format
*/

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{AccountEvent, OrderBookEvent, TickerEvent, TradeEvent};

/// Field that names the kind of every inbound message
pub const DISCRIMINANT_FIELD: &str = "info";

/// Inbound frame after classification on its `info` field
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Server nonce to answer for authentication; `None` if `msg` is absent
    Challenge { msg: Option<String> },
    Authenticated,
    Subscribed { channel: String, market: Value },
    Account(AccountEvent),
    Ticker(TickerEvent),
    OrderBook(OrderBookEvent),
    Trade(TradeEvent),
    /// Unrecognized or missing discriminant
    Unknown { info: Option<String>, raw: Value },
}

impl InboundMessage {
    /// Parse a frame in two steps: read it as a JSON object, then decode
    /// the variant selected by its discriminant.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: Map<String, Value> = serde_json::from_str(text)?;
        Self::from_object(raw)
    }

    pub fn from_object(raw: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let info = raw
            .get(DISCRIMINANT_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);

        let message = match info.as_deref() {
            Some("challenge") => InboundMessage::Challenge {
                msg: raw.get("msg").and_then(Value::as_str).map(str::to_owned),
            },
            Some("authenticated") => InboundMessage::Authenticated,
            Some("subscribed") => InboundMessage::Subscribed {
                channel: raw
                    .get("channel")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                market: raw.get("market").cloned().unwrap_or(Value::Null),
            },
            Some("account") => InboundMessage::Account(AccountEvent(raw)),
            Some("ticker") => InboundMessage::Ticker(serde_json::from_value(Value::Object(raw))?),
            Some("orderbook") => {
                InboundMessage::OrderBook(serde_json::from_value(Value::Object(raw))?)
            }
            Some("trade") => InboundMessage::Trade(serde_json::from_value(Value::Object(raw))?),
            _ => InboundMessage::Unknown {
                info: info.clone(),
                raw: Value::Object(raw),
            },
        };

        Ok(message)
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::Challenge { .. } => "challenge",
            InboundMessage::Authenticated => "authenticated",
            InboundMessage::Subscribed { .. } => "subscribed",
            InboundMessage::Account(_) => "account",
            InboundMessage::Ticker(_) => "ticker",
            InboundMessage::OrderBook(_) => "orderbook",
            InboundMessage::Trade(_) => "trade",
            InboundMessage::Unknown { info, .. } => info.as_deref().unwrap_or("unknown"),
        }
    }
}

/// Outbound command frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    Subscribe {
        channel: String,
        params: Map<String, Value>,
    },
    Auth {
        access_key: String,
        answer: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Subscribe { .. } => "subscribe",
            Command::Auth { .. } => "auth",
        }
    }
}
