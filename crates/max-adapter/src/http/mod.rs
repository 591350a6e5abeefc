/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: Signed JSON requests and typed responses
[POS]:    HTTP layer - REST transport boundary
[UPDATE]: When changing request signing or client behavior
*/

pub mod client;
pub mod error;
pub mod signature;

pub use error::{MaxError, Result};
pub use signature::{
    HEADER_ACCESS_KEY, HEADER_PAYLOAD, HEADER_SIGNATURE, RequestSigner, SignedPayload,
};

pub use client::{ClientConfig, DEFAULT_BASE_URL, MaxClient};
