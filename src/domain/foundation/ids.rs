//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Identifier of a physical measurement device.
///
/// Used verbatim as a topic segment (`devices/{id}/data`) and as the room
/// key, so it must be non-empty and free of `/`, whitespace and control
/// characters. Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier, rejecting tokens that cannot name a topic segment.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::empty_field("device_id"));
        }
        if raw.contains('/') {
            return Err(ValidationError::invalid_format(
                "device_id",
                "must not contain '/'",
            ));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::invalid_format(
                "device_id",
                "must not contain whitespace or control characters",
            ));
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// Unique identifier for a connected viewer session.
///
/// Generated server-side when a viewer connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(Uuid);

impl ViewerId {
    /// Creates a new random ViewerId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one frequency sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SweepId(Uuid);

impl SweepId {
    /// Creates a new random SweepId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SweepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SweepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_accepts_plain_token() {
        let id = DeviceId::new("esp32-lab-01").unwrap();
        assert_eq!(id.as_str(), "esp32-lab-01");
        assert_eq!(id.to_string(), "esp32-lab-01");
    }

    #[test]
    fn device_id_rejects_empty() {
        assert!(matches!(
            DeviceId::new(""),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn device_id_rejects_topic_separator() {
        assert!(DeviceId::new("a/b").is_err());
    }

    #[test]
    fn device_id_rejects_whitespace() {
        assert!(DeviceId::new("D 1").is_err());
        assert!(DeviceId::new(" D1").is_err());
        assert!(DeviceId::new("D1\n").is_err());
    }

    #[test]
    fn device_id_equality_is_exact() {
        assert_ne!(DeviceId::new("D1").unwrap(), DeviceId::new("d1").unwrap());
    }

    #[test]
    fn device_id_deserialization_validates() {
        let ok: Result<DeviceId, _> = serde_json::from_str(r#""D2""#);
        assert_eq!(ok.unwrap().as_str(), "D2");

        let bad: Result<DeviceId, _> = serde_json::from_str(r#""""#);
        assert!(bad.is_err());
    }

    #[test]
    fn device_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&DeviceId::new("D1").unwrap()).unwrap();
        assert_eq!(json, r#""D1""#);
    }

    #[test]
    fn viewer_ids_are_unique() {
        assert_ne!(ViewerId::new(), ViewerId::new());
    }

    #[test]
    fn sweep_id_display_is_uuid() {
        assert_eq!(SweepId::new().to_string().len(), 36);
    }
}
