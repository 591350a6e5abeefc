/*
[INPUT]:  Error sources (HTTP, API, serialization, configuration, WebSocket)
[OUTPUT]: Structured error types with context and classification helpers
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Main error type for the MAX adapter
#[derive(Error, Debug)]
pub enum MaxError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Authenticated request attempted without usable credentials
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Operation attempted after the stream connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MaxError {
    /// Check if the error means the stream connection is unusable
    pub fn is_connection_error(&self) -> bool {
        matches!(self, MaxError::WebSocket(_) | MaxError::ConnectionClosed)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        match self {
            MaxError::Authentication { .. } => true,
            MaxError::Api { code, .. } => *code == StatusCode::UNAUTHORIZED.as_u16(),
            _ => false,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        MaxError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

impl From<tungstenite::Error> for MaxError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                MaxError::ConnectionClosed
            }
            other => MaxError::WebSocket(other.to_string()),
        }
    }
}

/// Result type alias for MAX adapter operations
pub type Result<T> = std::result::Result<T, MaxError>;
