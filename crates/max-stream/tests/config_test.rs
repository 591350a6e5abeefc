/*
[INPUT]:  YAML configuration samples
[OUTPUT]: Configuration parsing and validation results
[POS]:    Integration test layer - configuration
[UPDATE]: When adding configuration options or validation rules
*/

use max_adapter::Channel;
use max_stream::MonitorConfig;
use tokio_test::assert_ok;

#[test]
fn test_full_config_parses() {
    let yaml = r#"
ws_url: ws://127.0.0.1:9001
markets: [btctwd, ethtwd]
channels: [ticker, orderbook, trade]
account: true
channel_capacity: 16
credentials:
  access_key: key
  secret_key: secret
"#;

    let config = MonitorConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.markets, vec!["btctwd", "ethtwd"]);
    assert_eq!(
        config.channels,
        vec![Channel::Ticker, Channel::OrderBook, Channel::Trade]
    );
    assert_eq!(config.channel_capacity, 16);
    assert_eq!(config.subscription_count(), 7);
    assert!(config.validate().is_ok());

    let stream = config.stream_config();
    assert_eq!(stream.url, "ws://127.0.0.1:9001");
    assert_eq!(stream.credentials.unwrap().access_key(), "key");
}

#[test]
fn test_sample_config_file_is_valid() {
    let path = format!("{}/config/monitor.yaml", env!("CARGO_MANIFEST_DIR"));
    let config = assert_ok!(MonitorConfig::from_file(&path));
    assert_ok!(config.validate());
}

#[test]
fn test_order_book_alias_is_accepted() {
    let config = MonitorConfig::from_yaml_str("markets: [btctwd]\nchannels: [order_book]").unwrap();
    assert_eq!(config.channels, vec![Channel::OrderBook]);
}

#[test]
fn test_unknown_channel_is_rejected() {
    assert!(MonitorConfig::from_yaml_str("markets: [btctwd]\nchannels: [kline]").is_err());
}

#[test]
fn test_validation_failures() {
    let cases = [
        ("markets: []", "nothing to subscribe"),
        ("markets: [btctwd]\nchannels: []", "without channels"),
        ("markets: ['']", "must not be empty"),
        ("markets: [btctwd]\nchannel_capacity: 0", "channel_capacity"),
        ("account: true", "need credentials"),
        ("markets: [btctwd]\nws_url: https://max-ws.maicoin.com", "ws or wss"),
    ];

    for (yaml, expected) in cases {
        let config = MonitorConfig::from_yaml_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            format!("{err:#}").contains(expected),
            "{yaml:?} gave {err:#}"
        );
    }
}
