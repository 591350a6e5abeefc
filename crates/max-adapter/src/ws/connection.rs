/*
[INPUT]:  Stream endpoint URL, outbound commands, shutdown requests
[OUTPUT]: One transport connection with a single read loop and serialized writes
[POS]:    WebSocket layer - connection lifecycle
[UPDATE]: When changing dial, read loop, or shutdown behavior
*/

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{MaxError, Result};

use super::message::Command;
use super::router::Router;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Transport lifecycle of a stream client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }
}

pub(crate) struct Connection {
    url: String,
    sink: Mutex<Option<WsSink>>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("state", &*self.state.borrow())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Connection {
    /// Dial `url` and start the read loop that feeds `router`.
    ///
    /// A dial failure is returned as is; no connection value exists
    /// afterwards.
    pub(crate) async fn open(url: &str, router: Arc<Router>) -> Result<Arc<Self>> {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        state.send_replace(ConnectionState::Connecting);

        debug!(url, "ws dialing");
        let (stream, _response) = connect_async(url).await?;
        let (sink, source) = stream.split();

        let connection = Arc::new(Self {
            url: url.to_string(),
            sink: Mutex::new(Some(sink)),
            state,
            shutdown: CancellationToken::new(),
            reader: StdMutex::new(None),
        });
        connection.state.send_replace(ConnectionState::Connected);
        info!(url, "ws connected");

        let handle = tokio::spawn(read_loop(connection.clone(), source, router));
        *connection
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(connection)
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Write one command frame. Concurrent callers are serialized.
    pub(crate) async fn send(&self, command: &Command) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(MaxError::ConnectionClosed);
        }

        let payload = serde_json::to_string(command)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(MaxError::ConnectionClosed)?;
        sink.send(WsMessage::Text(payload.into())).await?;

        debug!(command = command.name(), "ws command sent");
        Ok(())
    }

    /// Stop the read loop and release the transport.
    ///
    /// Repeated calls are no-ops once the connection is closed.
    pub(crate) async fn close(&self) {
        let initiated = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = ConnectionState::Closing;
                true
            }
        });
        if initiated {
            info!(url = %self.url, "ws closing");
        }

        self.shutdown.cancel();

        if let Some(mut sink) = self.sink.lock().await.take()
            && let Err(err) = sink.close().await
        {
            debug!(error = %err, "ws close frame not delivered");
        }

        // Only the caller holding the reader handle publishes `Closed`, after
        // the loop has joined. Concurrent callers wait for that.
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match reader {
            Some(reader) => {
                if let Err(err) = reader.await {
                    warn!(error = %err, "ws read loop ended abnormally");
                }
                self.state.send_replace(ConnectionState::Closed);
            }
            None => {
                let mut state = self.state.subscribe();
                let _ = state.wait_for(|state| *state == ConnectionState::Closed).await;
            }
        }
    }
}

async fn read_loop(connection: Arc<Connection>, mut source: WsSource, router: Arc<Router>) {
    loop {
        let frame = tokio::select! {
            _ = connection.shutdown.cancelled() => break,
            frame = source.next() => frame,
        };

        let text = match frame {
            Some(Ok(WsMessage::Text(text))) => text.to_string(),
            Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(err) => {
                    debug!(error = %err, "ws binary frame is not utf-8");
                    continue;
                }
            },
            Some(Ok(WsMessage::Close(frame))) => {
                info!(frame = ?frame, "ws closed by server");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(error = %err, "ws read failed");
                break;
            }
            None => {
                info!("ws stream ended");
                break;
            }
        };

        if let Some(command) = router.route(&text) {
            match connection.send(&command).await {
                Ok(()) => router.command_sent(&command),
                Err(err) => warn!(command = command.name(), error = %err, "ws reply failed"),
            }
        }
    }

    router.on_disconnect();
    connection.state.send_if_modified(|state| {
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Closed;
            true
        } else {
            false
        }
    });
    debug!(url = %connection.url, "ws read loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::bus::EventBus;
    use crate::ws::handshake::Handshake;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn idle_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while ws.next().await.is_some() {}
        });
        format!("ws://{addr}")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_close_reports_closed_after_read_loop_stops() {
        let url = idle_server().await;
        let bus = Arc::new(EventBus::new());
        let router = Arc::new(Router::new(bus.clone(), Handshake::new(None)));
        let connection = Connection::open(&url, router).await.unwrap();

        let closers = (0..4).map(|_| {
            let connection = connection.clone();
            let bus = bus.clone();
            tokio::spawn(async move {
                connection.close().await;
                assert_eq!(connection.state(), ConnectionState::Closed);
                // The read loop closes the bus on its way out.
                assert!(bus.is_closed());
            })
        });
        for closer in closers.collect::<Vec<_>>() {
            closer.await.unwrap();
        }

        assert!(matches!(
            connection.send(&Command::Subscribe {
                channel: "ticker".to_string(),
                params: crate::ws::topic::market_params("btctwd"),
            })
            .await,
            Err(MaxError::ConnectionClosed)
        ));
    }
}
