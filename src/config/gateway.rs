//! Viewer session buffer configuration

use serde::Deserialize;

use crate::application::GatewayConfig;

use super::error::ValidationError;

/// Per-session channel capacities
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Room mailbox capacity; overflow is dropped for slow viewers
    #[serde(default = "default_buffer")]
    pub session_buffer: usize,

    /// Outbound notification channel capacity
    #[serde(default = "default_buffer")]
    pub outbound_buffer: usize,
}

impl GatewaySettings {
    /// Validate buffer sizes
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_buffer == 0 {
            return Err(ValidationError::InvalidBufferSize("session_buffer"));
        }
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidBufferSize("outbound_buffer"));
        }
        Ok(())
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            session_buffer: default_buffer(),
            outbound_buffer: default_buffer(),
        }
    }
}

impl From<&GatewaySettings> for GatewayConfig {
    fn from(settings: &GatewaySettings) -> Self {
        GatewayConfig {
            session_buffer: settings.session_buffer,
            outbound_buffer: settings.outbound_buffer,
        }
    }
}

fn default_buffer() -> usize {
    256
}
