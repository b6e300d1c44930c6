//! Device feed connecting inbound bus traffic to device rooms.
//!
//! # Message Flow
//!
//! ```text
//! BusAdapter inbound channel
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  DeviceFeed        │  data   → unwrap envelope → parse → Sample | Malformed
//! │                    │  status → text
//! └────────────────────┘
//!          │
//!          ▼
//! RoomRouter::broadcast(device, update)
//! ```
//!
//! Messages are handled one at a time in arrival order, so per-device
//! ordering from the bus is preserved all the way into session mailboxes.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::bus::TopicKind;
use crate::domain::measurement::{self, ParseError, Sample};
use crate::ports::InboundMessage;

use super::rooms::{DeviceUpdate, RoomRouter};

/// JSON form of a data payload: `{"msg": "<value>;<frequency><tag>"}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    msg: String,
}

/// Decode a data-topic payload, raw or wrapped in a JSON envelope.
///
/// On failure the error carries the payload exactly as received.
pub fn decode_measurement(payload: &str) -> Result<Sample, ParseError> {
    if !payload.trim_start().starts_with('{') {
        return measurement::parse(payload);
    }
    let envelope: Envelope =
        serde_json::from_str(payload).map_err(|_| ParseError::Malformed {
            raw: payload.to_string(),
        })?;
    measurement::parse(&envelope.msg).map_err(|_| ParseError::Malformed {
        raw: payload.to_string(),
    })
}

/// Fans inbound device messages out to their rooms.
pub struct DeviceFeed {
    rooms: Arc<RoomRouter>,
}

impl DeviceFeed {
    pub fn new(rooms: Arc<RoomRouter>) -> Self {
        Self { rooms }
    }

    /// Consume inbound messages until the channel closes or shutdown.
    pub async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Device feed started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle(message).await;
                    }
                    None => break,
                },
            }
        }
        tracing::info!("Device feed stopped");
    }

    /// Route one message. Returns how many sessions received it.
    pub async fn handle(&self, message: InboundMessage) -> usize {
        let update = match message.kind {
            TopicKind::Data => match decode_measurement(&message.payload) {
                Ok(sample) => DeviceUpdate::Sample(sample),
                Err(e) => {
                    tracing::warn!(
                        device_id = %message.device,
                        payload = %message.payload,
                        "Malformed measurement"
                    );
                    DeviceUpdate::Malformed(e)
                }
            },
            TopicKind::Status => DeviceUpdate::Status(message.payload),
            TopicKind::Command => return 0,
        };

        let delivered = self.rooms.broadcast(&message.device, update).await;
        tracing::trace!(device_id = %message.device, delivered, "Routed device message");
        delivered
    }
}
