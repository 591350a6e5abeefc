/*
[INPUT]:  YAML configuration file and MAX_* environment variables
[OUTPUT]: Validated monitor configuration
[POS]:    Configuration layer - stream monitor setup
[UPDATE]: When adding new configuration options
*/

use anyhow::{Result, bail};
use max_adapter::ws::DEFAULT_STREAM_URL;
use max_adapter::{Channel, Credentials, StreamConfig};
use serde::{Deserialize, Serialize};

pub const ENV_ACCESS_KEY: &str = "MAX_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "MAX_SECRET_KEY";

/// Top-level configuration for the stream monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Stream endpoint; the public MAX endpoint when omitted
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Markets to subscribe, e.g. "btctwd"
    #[serde(default)]
    pub markets: Vec<String>,
    /// Channels opened for every market
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
    /// Also print account events (needs credentials)
    #[serde(default)]
    pub account: bool,
    /// Delivery buffer per subscription
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

/// API key pair as written in the config file
#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Ticker]
}

fn default_channel_capacity() -> usize {
    64
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Override file credentials with MAX_ACCESS_KEY / MAX_SECRET_KEY
    pub fn apply_env_credentials(&mut self) {
        self.apply_credentials_from(|key| std::env::var(key).ok());
    }

    /// Override credentials when both keys are found by `lookup`
    pub fn apply_credentials_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let access_key = lookup(ENV_ACCESS_KEY).filter(|value| !value.is_empty());
        let secret_key = lookup(ENV_SECRET_KEY).filter(|value| !value.is_empty());
        if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
            self.credentials = Some(CredentialsConfig {
                access_key,
                secret_key,
            });
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() && !self.account {
            bail!("nothing to subscribe: set markets or enable account");
        }
        if !self.markets.is_empty() && self.channels.is_empty() {
            bail!("markets configured without channels");
        }
        if self.markets.iter().any(|market| market.trim().is_empty()) {
            bail!("market names must not be empty");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be greater than zero");
        }
        if self.account && self.credentials.is_none() {
            bail!("account events need credentials");
        }

        self.stream_config().validate()?;
        Ok(())
    }

    /// Number of subscriptions this configuration opens
    pub fn subscription_count(&self) -> usize {
        self.markets.len() * self.channels.len() + usize::from(self.account)
    }

    pub fn stream_config(&self) -> StreamConfig {
        let mut config = StreamConfig::new()
            .with_url(self.ws_url.as_deref().unwrap_or(DEFAULT_STREAM_URL));
        if let Some(credentials) = &self.credentials {
            config = config.with_credentials(Credentials::new(
                credentials.access_key.clone(),
                credentials.secret_key.clone(),
            ));
        }
        config
    }
}
