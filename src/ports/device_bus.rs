//! DeviceBus port - Device-level view of the pub/sub connection.
//!
//! Callers speak in device identifiers; topic naming, subscription
//! bookkeeping and reconnection stay behind this port.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::bus::{BusError, ConnectionState, TopicKind};
use crate::domain::foundation::DeviceId;

/// A payload received from a device, tagged with the topic it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub device: DeviceId,
    pub kind: TopicKind,
    pub payload: String,
}

/// Port for device subscriptions and command publishing.
///
/// Every call made while the connection is not `Connected` fails fast
/// with [`BusError::NotConnected`]; nothing is queued.
#[async_trait]
pub trait DeviceBus: Send + Sync {
    /// Start receiving a device's data (and status) messages.
    async fn subscribe(&self, device: &DeviceId) -> Result<(), BusError>;

    /// Stop receiving a device's messages.
    async fn unsubscribe(&self, device: &DeviceId) -> Result<(), BusError>;

    /// Publish command text on `devices/{device}/command`.
    async fn publish_command(&self, device: &DeviceId, command: &str) -> Result<(), BusError>;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Receiver notified on every connection state change.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;
}
