/*
[INPUT]:  In-process stream server and monitor configuration
[OUTPUT]: Printed event lines and shutdown behavior
[POS]:    Integration test layer - monitor lifecycle
[UPDATE]: When changing subscription fan-in or shutdown logic
*/

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use max_stream::{Monitor, MonitorConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

/// Accept one client, wait for `expected_commands` subscribes, then push
/// `frames` and optionally hang up.
async fn serve(frames: Vec<String>, expected_commands: usize, hang_up: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();

        let mut seen = 0;
        while seen < expected_commands {
            match read.next().await {
                Some(Ok(Message::Text(_))) => seen += 1,
                Some(Ok(_)) => {}
                _ => return,
            }
        }
        for frame in frames {
            write.send(Message::Text(frame.into())).await.unwrap();
        }
        if hang_up {
            let _ = write.close().await;
        } else {
            while read.next().await.is_some() {}
        }
    });

    format!("ws://{addr}")
}

fn config(url: &str) -> MonitorConfig {
    MonitorConfig::from_yaml_str(&format!(
        "ws_url: {url}\nmarkets: [btctwd]\nchannels: [ticker, trade]\nchannel_capacity: 4\n"
    ))
    .unwrap()
}

#[tokio::test]
async fn test_events_are_printed_as_json_lines() {
    let frames = vec![
        r#"{"info":"ticker","market":"btctwd","at":1620000000000,"buy":"100.5","sell":"100.7","open":"99","last":"100.6","high":"101","low":"98","vol":"3.2"}"#
            .to_string(),
        r#"{"info":"trade","market":"btctwd","at":"1620000000001","price":"100.6","volume":"0.25"}"#
            .to_string(),
    ];
    let url = serve(frames, 2, false).await;
    let shutdown = CancellationToken::new();
    let (lines_tx, mut lines_rx) = mpsc::channel(8);

    let monitor = Monitor::start(&config(&url), lines_tx, shutdown.clone())
        .await
        .unwrap();

    let mut printed = Vec::new();
    for _ in 0..2 {
        let line = timeout(WAIT, lines_rx.recv()).await.unwrap().unwrap();
        printed.push(serde_json::from_str::<Value>(&line).unwrap());
    }
    printed.sort_by_key(|line| line["topic"].as_str().unwrap_or_default().to_string());

    assert_eq!(printed[0]["topic"], r#"["ticker",{"market":"btctwd"}]"#);
    assert_eq!(printed[0]["event"]["buy"], "100.5");
    assert_eq!(printed[1]["topic"], r#"["trade",{"market":"btctwd"}]"#);
    assert_eq!(printed[1]["event"]["price"], "100.6");

    shutdown.cancel();
    timeout(WAIT, monitor.wait()).await.unwrap();
    assert!(timeout(WAIT, lines_rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_hang_up_triggers_shutdown() {
    let url = serve(Vec::new(), 2, true).await;
    let shutdown = CancellationToken::new();
    let (lines_tx, _lines_rx) = mpsc::channel(8);

    let monitor = Monitor::start(&config(&url), lines_tx, shutdown.clone())
        .await
        .unwrap();

    timeout(WAIT, shutdown.cancelled()).await.unwrap();
    timeout(WAIT, monitor.wait()).await.unwrap();
}
