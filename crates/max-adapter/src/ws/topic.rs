/*
[INPUT]:  Channel name and subscription parameters
[OUTPUT]: Canonical topic keys used by the event bus
[POS]:    WebSocket layer - subscription identity
[UPDATE]: When adding channels or changing topic canonicalization
*/

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fixed topic for per-user account events
pub const ACCOUNT_TOPIC: &str = "account";

/// Market data channels that take a `market` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ticker,
    #[serde(alias = "order_book")]
    OrderBook,
    Trade,
}

impl Channel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Channel::Ticker => "ticker",
            Channel::OrderBook => "orderbook",
            Channel::Trade => "trade",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical key for one logical subscription.
///
/// Rendered as the JSON array `[channel, params]` with params keys sorted,
/// e.g. `["ticker",{"market":"btctwd"}]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn new(channel: &str, params: &Map<String, Value>) -> Self {
        let ordered: BTreeMap<&str, &Value> =
            params.iter().map(|(key, value)| (key.as_str(), value)).collect();
        Self(serde_json::json!([channel, ordered]).to_string())
    }

    /// Topic for a per-market channel
    pub fn market(channel: Channel, market: &str) -> Self {
        Self::new(channel.as_str(), &market_params(market))
    }

    pub fn account() -> Self {
        Self(ACCOUNT_TOPIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscribe parameters for a per-market channel
pub fn market_params(market: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("market".to_string(), Value::String(market.to_string()));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn topic_matches_wire_encoding() {
        let topic = Topic::market(Channel::Ticker, "btctwd");
        assert_eq!(topic.as_str(), r#"["ticker",{"market":"btctwd"}]"#);
    }

    #[test]
    fn topic_is_deterministic() {
        assert_eq!(
            Topic::market(Channel::Trade, "btctwd"),
            Topic::market(Channel::Trade, "btctwd")
        );
    }

    #[rstest]
    #[case(Channel::Ticker, "btctwd", Channel::Ticker, "ethtwd")]
    #[case(Channel::Ticker, "btctwd", Channel::Trade, "btctwd")]
    #[case(Channel::OrderBook, "btctwd", Channel::Trade, "btctwd")]
    fn topics_differ_by_channel_or_market(
        #[case] left_channel: Channel,
        #[case] left_market: &str,
        #[case] right_channel: Channel,
        #[case] right_market: &str,
    ) {
        assert_ne!(
            Topic::market(left_channel, left_market),
            Topic::market(right_channel, right_market)
        );
    }

    #[test]
    fn topic_ignores_param_insertion_order() {
        let mut first = Map::new();
        first.insert("market".to_string(), Value::String("btctwd".to_string()));
        first.insert("depth".to_string(), Value::from(5));

        let mut second = Map::new();
        second.insert("depth".to_string(), Value::from(5));
        second.insert("market".to_string(), Value::String("btctwd".to_string()));

        assert_eq!(Topic::new("orderbook", &first), Topic::new("orderbook", &second));
    }

    #[test]
    fn channel_names_round_trip_through_serde() {
        let channel: Channel = serde_json::from_str(r#""orderbook""#).unwrap();
        assert_eq!(channel, Channel::OrderBook);
        assert_eq!(serde_json::to_string(&Channel::Trade).unwrap(), r#""trade""#);
    }
}
