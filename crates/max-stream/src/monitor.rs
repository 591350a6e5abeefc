/*
[INPUT]:  Monitor configuration, output line sink, shutdown token
[OUTPUT]: One JSON line per received stream event
[POS]:    Runtime layer - subscription fan-in and lifecycle
[UPDATE]: When changing what is subscribed or how events are printed
*/

use anyhow::{Context, Result};
use max_adapter::ws::StreamPayload;
use max_adapter::{Channel, ConnectionState, MaxWebSocket, Subscription};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;

/// One printed event
#[derive(Debug, Serialize)]
struct EventLine<'a, T> {
    topic: &'a str,
    event: &'a T,
}

/// Running set of subscriptions feeding one output sink
pub struct Monitor {
    client: MaxWebSocket,
    tasks: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Monitor {
    /// Connect, subscribe to everything in `config`, and start forwarding.
    ///
    /// Forwarding stops when `shutdown` is cancelled or the connection closes.
    pub async fn start(
        config: &MonitorConfig,
        lines: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let client = MaxWebSocket::connect(config.stream_config())
            .await
            .context("connect to stream")?;
        info!(url = client.url(), "stream connected");

        let mut monitor = Self {
            client,
            tasks: Vec::with_capacity(config.subscription_count() + 1),
            shutdown,
        };
        monitor.watch_connection();

        let capacity = config.channel_capacity;
        for market in &config.markets {
            for channel in &config.channels {
                match channel {
                    Channel::Ticker => {
                        let sub = monitor.client.subscribe_ticker(market, capacity).await;
                        monitor.forward(sub.context("subscribe ticker")?, lines.clone());
                    }
                    Channel::OrderBook => {
                        let sub = monitor.client.subscribe_order_book(market, capacity).await;
                        monitor.forward(sub.context("subscribe orderbook")?, lines.clone());
                    }
                    Channel::Trade => {
                        let sub = monitor.client.subscribe_trade(market, capacity).await;
                        monitor.forward(sub.context("subscribe trade")?, lines.clone());
                    }
                }
            }
        }

        if config.account {
            let sub = monitor
                .client
                .subscribe_account(capacity)
                .context("subscribe account")?;
            monitor.forward(sub, lines);
        }

        info!(subscriptions = config.subscription_count(), "stream subscriptions started");
        Ok(monitor)
    }

    pub fn client(&self) -> &MaxWebSocket {
        &self.client
    }

    /// Wait for shutdown, close every subscription, then the client
    pub async fn wait(self) {
        self.shutdown.cancelled().await;
        self.stop().await;
    }

    /// Close every subscription, then the client
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                warn!(error = %err, "forward task failed");
            }
        }
        self.client.close().await;
        info!("stream monitor stopped");
    }

    fn watch_connection(&mut self) {
        let mut state = self.client.subscribe_state();
        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                closed = async {
                    state
                        .wait_for(|state| *state == ConnectionState::Closed)
                        .await
                        .is_ok()
                } => {
                    if closed {
                        warn!("stream connection closed by server");
                    }
                    shutdown.cancel();
                }
            }
        }));
    }

    fn forward<T>(&mut self, mut sub: Subscription<T>, lines: mpsc::Sender<String>)
    where
        T: StreamPayload + Serialize + Sync,
    {
        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = sub.recv() => event,
                };
                let Some(event) = event else {
                    break;
                };

                let line = serde_json::to_string(&EventLine {
                    topic: sub.topic().as_str(),
                    event: &event,
                });
                match line {
                    Ok(line) => {
                        if lines.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(topic = %sub.topic(), error = %err, "event not printable"),
                }
            }

            sub.close();
            debug!(topic = %sub.topic(), "forward task stopped");
        }));
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
