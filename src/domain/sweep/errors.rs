//! Sweep-specific error types.

use thiserror::Error;

use crate::domain::foundation::ErrorCode;

/// Sweep rejections. All are synchronous: nothing is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("Invalid sweep parameters: {0}")]
    InvalidParameters(String),

    #[error("A sweep is already running for this session")]
    AlreadyRunning,

    #[error("No sweep is running")]
    NotRunning,
}

impl SweepError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SweepError::InvalidParameters(reason.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SweepError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            SweepError::AlreadyRunning => ErrorCode::SweepAlreadyRunning,
            SweepError::NotRunning => ErrorCode::NoSweepRunning,
        }
    }
}
