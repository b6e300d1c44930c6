//! Bus and command error types.

use thiserror::Error;

use crate::domain::foundation::ErrorCode;

/// Failures of bus operations. Never retried at the call site; reconnection
/// is the bus adapter's own concern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Bus is not connected")]
    NotConnected,

    #[error("Failed to connect to broker: {0}")]
    ConnectFailed(String),

    #[error("Failed to subscribe to {topic}: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("Failed to unsubscribe from {topic}: {reason}")]
    UnsubscribeFailed { topic: String, reason: String },

    #[error("Failed to publish to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },
}

impl BusError {
    pub fn subscribe_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::SubscribeFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn unsubscribe_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::UnsubscribeFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn publish_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BusError::NotConnected | BusError::ConnectFailed(_) => ErrorCode::NotConnected,
            BusError::SubscribeFailed { .. } => ErrorCode::SubscribeFailed,
            BusError::UnsubscribeFailed { .. } => ErrorCode::UnsubscribeFailed,
            BusError::PublishFailed { .. } => ErrorCode::PublishFailed,
        }
    }
}

/// Rejection of a viewer command before it reaches the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid command target: {reason}")]
    InvalidTarget { reason: String },
}

impl CommandError {
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        CommandError::InvalidTarget {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidTarget
    }
}
