/*
[INPUT]:  Decoded realtime frames (ticker, orderbook, trade, account)
[OUTPUT]: Typed event values with exact decimals and UTC timestamps
[POS]:    Data layer - stream event definitions
[UPDATE]: When the server adds event fields or changes numeric encoding
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Realtime price summary for one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    #[serde(default)]
    pub market: String,
    #[serde(deserialize_with = "serde_helpers::deserialize_millis")]
    pub at: DateTime<Utc>,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub buy: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub sell: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub open: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub last: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub high: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub low: Decimal,
    #[serde(
        rename = "vol",
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub volume: Decimal,
}

/// Incremental order book change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub market: String,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_i64_or_zero")]
    pub id: i64,
    #[serde(default)]
    pub side: String,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub volume: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub price: Decimal,
    #[serde(rename = "ord_type", default)]
    pub order_type: String,
}

/// Public trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(deserialize_with = "serde_helpers::deserialize_millis")]
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub market: String,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub volume: Decimal,
    #[serde(
        deserialize_with = "serde_helpers::deserialize_decimal",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub price: Decimal,
}

/// Account change pushed to an authenticated connection.
///
/// The payload is kept as the raw key/value object sent by the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountEvent(pub Map<String, Value>);

impl AccountEvent {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Any event the router can publish
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Ticker(TickerEvent),
    OrderBook(OrderBookEvent),
    Trade(TradeEvent),
    Account(AccountEvent),
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Ticker(_) => "ticker",
            StreamEvent::OrderBook(_) => "orderbook",
            StreamEvent::Trade(_) => "trade",
            StreamEvent::Account(_) => "account",
        }
    }
}

mod serde_helpers {
    use super::{DateTime, Decimal, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    /// Required decimal: null and blank strings are errors.
    pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        decimal_from_value::<D::Error>(&value)?
            .ok_or_else(|| serde::de::Error::custom("empty decimal value"))
    }

    pub fn deserialize_decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(decimal_from_value::<D::Error>(&value)?.unwrap_or(Decimal::ZERO))
    }

    fn decimal_from_value<E: serde::de::Error>(value: &Value) -> Result<Option<Decimal>, E> {
        if value.is_null() {
            return Ok(None);
        }

        if let Some(raw) = value.as_str() {
            if raw.trim().is_empty() {
                return Ok(None);
            }
            return parse_decimal(raw.trim()).map(Some).map_err(E::custom);
        }

        // Numbers keep their literal text (arbitrary_precision), so this is exact.
        if value.is_number() {
            return parse_decimal(&value.to_string()).map(Some).map_err(E::custom);
        }

        Err(E::custom("invalid decimal value"))
    }

    pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize_i64_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(0),
            other => parse_i64(&other).map_err(serde::de::Error::custom),
        }
    }

    pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let millis = parse_i64(&value).map_err(serde::de::Error::custom)?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {millis}")))
    }

    fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
        Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw))
    }

    fn parse_i64(value: &Value) -> Result<i64, String> {
        match value {
            Value::String(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|err| format!("invalid integer {raw:?}: {err}")),
            Value::Number(number) => number
                .as_i64()
                .ok_or_else(|| format!("invalid integer {number}")),
            other => Err(format!("expected integer, got {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn ticker_decodes_string_fields_exactly() {
        let value = json!({
            "info": "ticker",
            "market": "btctwd",
            "at": "1620000000000",
            "buy": "100.5",
            "sell": "100.7",
            "open": "99",
            "last": "100.6",
            "high": "101.25",
            "low": "98.125",
            "vol": "12.345678901234567891"
        });

        let ticker: TickerEvent = serde_json::from_value(value).expect("ticker should deserialize");

        assert_eq!(ticker.market, "btctwd");
        assert_eq!(ticker.buy, Decimal::from_str("100.5").unwrap());
        assert_eq!(ticker.sell, Decimal::from_str("100.7").unwrap());
        assert_eq!(ticker.volume, Decimal::from_str("12.345678901234567891").unwrap());
        assert_eq!(ticker.at.timestamp_millis(), 1_620_000_000_000);
    }

    #[test]
    fn ticker_decodes_high_precision_number_literals() {
        let raw = r#"{"market":"ethtwd","at":1620000000123,"buy":0.123456789012345678,"sell":1e2,"open":0,"last":1,"high":2,"low":0.5,"vol":7}"#;

        let ticker: TickerEvent = serde_json::from_str(raw).expect("ticker should deserialize");

        assert_eq!(ticker.buy, Decimal::from_str("0.123456789012345678").unwrap());
        assert_eq!(ticker.sell, Decimal::from(100));
        assert_eq!(ticker.open, Decimal::ZERO);
        assert_eq!(ticker.at.timestamp_millis(), 1_620_000_000_123);
    }

    #[test]
    fn ticker_without_timestamp_is_rejected() {
        let value = json!({ "market": "btctwd", "buy": "1" });
        assert!(serde_json::from_value::<TickerEvent>(value).is_err());
    }

    #[test]
    fn ticker_with_missing_or_blank_prices_is_rejected() {
        let missing = json!({ "market": "btctwd", "at": "1620000000000" });
        assert!(serde_json::from_value::<TickerEvent>(missing).is_err());

        let blank = json!({
            "market": "btctwd",
            "at": "1620000000000",
            "buy": "",
            "sell": "1",
            "open": "1",
            "last": "1",
            "high": "1",
            "low": "1",
            "vol": null
        });
        assert!(serde_json::from_value::<TickerEvent>(blank).is_err());
    }

    #[test]
    fn trade_without_price_or_volume_is_rejected() {
        let missing = json!({ "at": "1620000000000", "market": "btctwd" });
        assert!(serde_json::from_value::<TradeEvent>(missing).is_err());

        let blank = json!({ "at": "1620000000000", "market": "btctwd", "price": "", "volume": "1" });
        assert!(serde_json::from_value::<TradeEvent>(blank).is_err());
    }

    #[test]
    fn orderbook_defaults_missing_numbers_to_zero() {
        let value = json!({ "action": "remove", "market": "btctwd", "id": 9, "side": "ask", "price": "" });

        let event: OrderBookEvent = serde_json::from_value(value).expect("orderbook should deserialize");

        assert_eq!(event.volume, Decimal::ZERO);
        assert_eq!(event.price, Decimal::ZERO);
    }

    #[test]
    fn orderbook_accepts_numeric_and_string_fields() {
        let value = json!({
            "action": "add",
            "market": "btctwd",
            "id": "42",
            "side": "bid",
            "volume": 0.5,
            "price": "1000000.1",
            "ord_type": "limit"
        });

        let event: OrderBookEvent = serde_json::from_value(value).expect("orderbook should deserialize");

        assert_eq!(event.id, 42);
        assert_eq!(event.volume, Decimal::from_str("0.5").unwrap());
        assert_eq!(event.price, Decimal::from_str("1000000.1").unwrap());
        assert_eq!(event.order_type, "limit");
    }

    #[test]
    fn trade_rejects_garbage_price() {
        let value = json!({ "at": "1620000000000", "market": "btctwd", "price": "abc" });
        assert!(serde_json::from_value::<TradeEvent>(value).is_err());
    }

    #[test]
    fn decimal_serializes_as_string() {
        let trade = TradeEvent {
            at: DateTime::from_timestamp_millis(1_620_000_000_000).unwrap(),
            market: "btctwd".to_string(),
            volume: Decimal::from_str("0.01").unwrap(),
            price: Decimal::from_str("100.5").unwrap(),
        };

        let value = serde_json::to_value(&trade).unwrap();
        assert_eq!(value["price"], json!("100.5"));
        assert_eq!(value["volume"], json!("0.01"));
    }
}
