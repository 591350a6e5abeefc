/*
[INPUT]:  Stream configuration and subscription requests
[OUTPUT]: Realtime market data and account events per topic
[POS]:    WebSocket layer - realtime data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod bus;
pub mod client;
mod connection;
mod handshake;
pub mod message;
mod router;
pub mod subscription;
pub mod topic;

pub use bus::{EventBus, HandlerId, HandlerQueue};
pub use client::{DEFAULT_STREAM_URL, MaxWebSocket, StreamConfig};
pub use connection::ConnectionState;
pub use handshake::AuthState;
pub use message::{Command, InboundMessage};
pub use subscription::{BACKLOG_WARN_THRESHOLD, StreamPayload, Subscription};
pub use topic::{ACCOUNT_TOPIC, Channel, Topic, market_params};
