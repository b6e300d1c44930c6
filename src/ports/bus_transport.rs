//! BusTransport port - Interface to the raw pub/sub wire client.
//!
//! The bus adapter owns exactly one live [`BusLink`] at a time and opens a
//! fresh one through [`BusTransport::open`] whenever the previous link is
//! lost. Implementations do not reconnect on their own.

use async_trait::async_trait;

use crate::domain::bus::BusError;

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: String,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Factory for broker links.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Open a new link to the broker.
    ///
    /// Fails with [`BusError::ConnectFailed`] when the broker is unreachable.
    async fn open(&self) -> Result<Box<dyn BusLink>, BusError>;

    /// Human-readable endpoint for logs. Must not contain credentials.
    fn endpoint(&self) -> String;
}

/// One live connection to the broker.
#[async_trait]
pub trait BusLink: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), BusError>;

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError>;

    /// Next message on any subscribed channel, in arrival order.
    ///
    /// Must be cancel-safe: dropping the future before completion loses no
    /// message. Returns `None` once the link is lost.
    async fn next_message(&mut self) -> Option<RawMessage>;
}
