//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `BODE_BRIDGE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use bode_bridge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Listening on {:?}", config.server.socket_addr());
//! ```

mod broker;
mod error;
mod gateway;
mod server;

pub use broker::BrokerConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewaySettings;
pub use server::{LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a bridge on
/// `0.0.0.0:8080` talking to a broker on `localhost:6379`.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (listen address, logging, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Broker configuration (pub/sub connection)
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Viewer session buffers
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `BODE_BRIDGE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `BODE_BRIDGE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `BODE_BRIDGE__BROKER__HOST=broker` -> `broker.host = broker`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BODE_BRIDGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.broker.validate()?;
        self.gateway.validate()?;
        Ok(())
    }
}
