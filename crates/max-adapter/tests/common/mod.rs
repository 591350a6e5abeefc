/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for max-adapter tests

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::MockServer;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Frames the mock stream server can push to its client
pub enum ServerFrame {
    Text(String),
    Disconnect,
}

/// Single-connection WebSocket server on a random local port.
///
/// Text frames from the client show up on `inbound`; `push` writes to it.
pub struct MockStreamServer {
    pub url: String,
    outbound: mpsc::UnboundedSender<ServerFrame>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerFrame>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => match frame {
                        Some(ServerFrame::Text(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerFrame::Disconnect) | None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = inbound_tx.send(text.to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            outbound,
            inbound,
        }
    }

    pub fn push(&self, text: impl Into<String>) {
        let _ = self.outbound.send(ServerFrame::Text(text.into()));
    }

    pub fn disconnect(&self) {
        let _ = self.outbound.send(ServerFrame::Disconnect);
    }

    /// Next command the client sent, parsed as JSON
    pub async fn next_command(&mut self) -> Value {
        let text = tokio::time::timeout(RECV_TIMEOUT, self.inbound.recv())
            .await
            .expect("timed out waiting for client command")
            .expect("mock server stopped");
        serde_json::from_str(&text).expect("client command is json")
    }
}

pub fn ticker_frame(market: &str, buy: &str, sell: &str) -> String {
    format!(
        r#"{{"info":"ticker","market":"{market}","at":"1620000000000","buy":"{buy}","sell":"{sell}","open":"99","last":"100.6","high":"101","low":"98","vol":"3.2"}}"#
    )
}
