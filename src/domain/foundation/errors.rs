//! Error types shared across the domain layer.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Stable error codes reported to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors
    InvalidDevice,
    InvalidTarget,
    InvalidRequest,
    NotJoined,

    // Bus errors
    NotConnected,
    SubscribeFailed,
    UnsubscribeFailed,
    PublishFailed,

    // Measurement errors
    MalformedMeasurement,

    // Sweep errors
    InvalidParameters,
    SweepAlreadyRunning,
    NoSweepRunning,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidDevice => "INVALID_DEVICE",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::NotJoined => "NOT_JOINED",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::SubscribeFailed => "SUBSCRIBE_FAILED",
            ErrorCode::UnsubscribeFailed => "UNSUBSCRIBE_FAILED",
            ErrorCode::PublishFailed => "PUBLISH_FAILED",
            ErrorCode::MalformedMeasurement => "MALFORMED_MEASUREMENT",
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::SweepAlreadyRunning => "SWEEP_ALREADY_RUNNING",
            ErrorCode::NoSweepRunning => "NO_SWEEP_RUNNING",
        };
        write!(f, "{}", s)
    }
}
