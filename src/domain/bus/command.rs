//! Validated command addressed to a device.

use crate::domain::foundation::DeviceId;

use super::errors::CommandError;

/// Command text bound for `devices/{deviceId}/command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    device: DeviceId,
    text: String,
}

impl DeviceCommand {
    /// Validates viewer input. Both fields are trimmed and must be non-empty.
    pub fn new(device: &str, text: &str) -> Result<Self, CommandError> {
        let device = device.trim();
        let text = text.trim();
        if device.is_empty() {
            return Err(CommandError::invalid_target("device id is empty"));
        }
        if text.is_empty() {
            return Err(CommandError::invalid_target("command text is empty"));
        }
        let device =
            DeviceId::new(device).map_err(|e| CommandError::invalid_target(e.to_string()))?;
        Ok(Self {
            device,
            text: text.to_string(),
        })
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
