/*
[INPUT]:  HTTP configuration (base URL, timeouts, credentials)
[OUTPUT]: Configured reqwest client for public and signed JSON calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::auth::{Credentials, NonceGenerator};

use super::error::{MaxError, Result};
use super::signature::RequestSigner;

/// Base URL for the MAX REST API
pub const DEFAULT_BASE_URL: &str = "https://max-api.maicoin.com";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Thin JSON transport for the MAX REST API
#[derive(Debug)]
pub struct MaxClient {
    http_client: Client,
    base_url: Url,
    signer: Option<RequestSigner>,
}

impl MaxClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            signer: None,
        })
    }

    /// Enable signed requests. The nonce source may be shared with other clients.
    pub fn with_credentials(mut self, credentials: Credentials, nonce: Arc<NonceGenerator>) -> Self {
        self.signer = Some(RequestSigner::new(credentials, nonce));
        self
    }

    pub fn signer(&self) -> Option<&RequestSigner> {
        self.signer.as_ref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint)?)
    }

    /// Build an unsigned request
    pub fn public_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.url(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build a request carrying the signed payload and X-MAX-* headers
    pub fn signed_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<RequestBuilder> {
        let signer = self.signer.as_ref().ok_or_else(|| MaxError::Authentication {
            message: "signed request needs credentials".to_string(),
        })?;

        let url = self.url(endpoint)?;
        let signed = signer.sign_request(url.path(), body)?;
        let builder = self.http_client.request(method, url);
        Ok(signer.apply(builder, signed))
    }

    /// Send `request` and decode a JSON response.
    ///
    /// Non-2xx statuses become [`MaxError::Api`] with the response text.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "http response");

        if !status.is_success() {
            return Err(MaxError::api_error(status, text));
        }

        serde_json::from_str(&text)
            .map_err(|err| MaxError::InvalidResponse(format!("{err}: {text}")))
    }
}
