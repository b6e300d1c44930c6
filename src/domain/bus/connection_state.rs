//! Lifecycle of the process-wide bus connection.
//!
//! ```text
//! Disconnected --connect()--> Connecting --link up--> Connected
//! Connected --link lost--> Reconnecting --link up--> Connected
//! any --shutdown--> Disconnected
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the bus connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    /// Link up; publish/subscribe calls are accepted.
    Connected,
    /// Link lost; retrying with a fixed backoff.
    Reconnecting,
    /// Not started yet, or released at shutdown.
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Publish/subscribe calls only succeed in this state.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Disconnected => "disconnected",
        };
        write!(f, "{}", s)
    }
}
