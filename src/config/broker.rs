//! Broker (Redis pub/sub) configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::error::ValidationError;

/// Broker connection configuration
#[derive(Debug, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// ACL user name
    #[serde(default)]
    pub username: Option<String>,

    /// Password (never logged)
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Connect over TLS (`rediss://`)
    #[serde(default)]
    pub tls: bool,

    /// Fixed delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Also subscribe each device's status topic
    #[serde(default = "default_subscribe_status")]
    pub subscribe_status: bool,
}

impl BrokerConfig {
    /// Get reconnect backoff as Duration
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Build the connection URL, credentials included.
    pub fn connection_url(&self) -> Result<Url, ValidationError> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{}://{}:{}", scheme, self.host, self.port))
            .map_err(|e| ValidationError::InvalidBrokerAddress(e.to_string()))?;

        if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| ValidationError::InvalidBrokerAddress("cannot carry a username".into()))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password.expose_secret()))
                .map_err(|_| ValidationError::InvalidBrokerAddress("cannot carry a password".into()))?;
        }
        Ok(url)
    }

    /// Validate broker configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BROKER__HOST"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if !(1..=300_000).contains(&self.reconnect_backoff_ms) {
            return Err(ValidationError::InvalidReconnectBackoff);
        }
        self.connection_url()?;
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            tls: false,
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            subscribe_status: default_subscribe_status(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_reconnect_backoff_ms() -> u64 {
    2000
}

fn default_subscribe_status() -> bool {
    true
}
