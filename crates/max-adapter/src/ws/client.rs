/*
[INPUT]:  Stream configuration (endpoint URL, optional credentials)
[OUTPUT]: Typed subscriptions for ticker, order book, trade and account events
[POS]:    WebSocket layer - public stream client
[UPDATE]: When adding channels or changing connection options
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::info;
use url::Url;

use crate::auth::Credentials;
use crate::http::{MaxError, Result};
use crate::types::{AccountEvent, OrderBookEvent, TickerEvent, TradeEvent};

use super::bus::EventBus;
use super::connection::{Connection, ConnectionState};
use super::handshake::{AuthState, Handshake};
use super::message::Command;
use super::router::Router;
use super::subscription::{StreamPayload, Subscription};
use super::topic::{Channel, Topic, market_params};

/// Public MAX stream endpoint
pub const DEFAULT_STREAM_URL: &str = "wss://max-ws.maicoin.com";

const SUBSCRIPTION_LOG_LIMIT: usize = 10;

static SUBSCRIBE_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Connection settings for [`MaxWebSocket`]
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            credentials: None,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Reject configurations that could never connect or authenticate
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)
            .map_err(|err| MaxError::Config(format!("invalid stream url {:?}: {err}", self.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(MaxError::Config(format!(
                "stream url must use ws or wss, got {}",
                url.scheme()
            )));
        }

        if let Some(credentials) = &self.credentials
            && !credentials.is_complete()
        {
            return Err(MaxError::Config(
                "credentials need both access key and secret key".to_string(),
            ));
        }

        Ok(())
    }
}

/// Realtime client for the MAX stream API.
///
/// Owns one connection. Every `subscribe_*` call returns an independent
/// [`Subscription`] with its own bounded delivery channel.
#[derive(Debug)]
pub struct MaxWebSocket {
    connection: Arc<Connection>,
    router: Arc<Router>,
    bus: Arc<EventBus>,
}

impl MaxWebSocket {
    /// Validate `config`, dial, and start reading
    pub async fn connect(config: StreamConfig) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let router = Arc::new(Router::new(bus.clone(), Handshake::new(config.credentials)));
        let connection = Connection::open(&config.url, router.clone()).await?;

        Ok(Self {
            connection,
            router,
            bus,
        })
    }

    pub async fn subscribe_ticker(
        &self,
        market: &str,
        capacity: usize,
    ) -> Result<Subscription<TickerEvent>> {
        self.subscribe_channel(Channel::Ticker, market, capacity).await
    }

    pub async fn subscribe_order_book(
        &self,
        market: &str,
        capacity: usize,
    ) -> Result<Subscription<OrderBookEvent>> {
        self.subscribe_channel(Channel::OrderBook, market, capacity).await
    }

    pub async fn subscribe_trade(
        &self,
        market: &str,
        capacity: usize,
    ) -> Result<Subscription<TradeEvent>> {
        self.subscribe_channel(Channel::Trade, market, capacity).await
    }

    /// Receive account events pushed after authentication.
    ///
    /// No command is sent; the server pushes these once the connection is
    /// authenticated. Without credentials the subscription stays empty.
    pub fn subscribe_account(&self, capacity: usize) -> Result<Subscription<AccountEvent>> {
        self.ensure_open()?;
        Subscription::register(self.bus.clone(), Topic::account(), capacity)
    }

    /// Register for `channel` on `market` and ask the server to start it
    pub async fn subscribe_channel<T: StreamPayload>(
        &self,
        channel: Channel,
        market: &str,
        capacity: usize,
    ) -> Result<Subscription<T>> {
        self.ensure_open()?;

        let params = market_params(market);
        let topic = Topic::new(channel.as_str(), &params);
        let subscription = Subscription::register(self.bus.clone(), topic, capacity)?;

        let command = Command::Subscribe {
            channel: channel.as_str().to_string(),
            params,
        };
        self.connection.send(&command).await?;
        log_subscription_sent(channel, market);

        Ok(subscription)
    }

    /// Whether the server acknowledged a subscribe for `topic`
    pub fn is_acknowledged(&self, topic: &Topic) -> bool {
        self.bus.is_acknowledged(topic)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Watch connection transitions, including a fatal read loop exit
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    pub fn auth_state(&self) -> AuthState {
        self.router.handshake().state()
    }

    pub fn subscribe_auth_state(&self) -> watch::Receiver<AuthState> {
        self.router.handshake().subscribe()
    }

    pub fn url(&self) -> &str {
        self.connection.url()
    }

    /// Stop reading and release the transport.
    ///
    /// Open subscriptions are left to their owners; they stop receiving.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.connection.state() != ConnectionState::Connected || self.bus.is_closed() {
            return Err(MaxError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Drop for MaxWebSocket {
    fn drop(&mut self) {
        self.connection.shutdown_token().cancel();
    }
}

fn log_subscription_sent(channel: Channel, market: &str) {
    let count = SUBSCRIBE_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= SUBSCRIPTION_LOG_LIMIT {
        return;
    }

    info!(
        sample_index = count + 1,
        sample_limit = SUBSCRIPTION_LOG_LIMIT,
        channel = %channel,
        market,
        "ws subscription sent"
    );
}
