/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public MAX adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, NonceGenerator, sign_payload};

// Re-export commonly used types from http
pub use http::{ClientConfig, MaxClient, MaxError, RequestSigner, Result, SignedPayload};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    AuthState,
    Channel,
    ConnectionState,
    MaxWebSocket,
    StreamConfig,
    Subscription,
    Topic,
};
