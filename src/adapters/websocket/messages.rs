//! WebSocket message types for the viewer control channel.
//!
//! Defines the JSON protocol between the bridge and viewers. Every frame
//! is an object tagged by `type` (snake_case); fields are camelCase.
//! - Client → Server: join/leave devices, commands, sweeps, state requests, pings
//! - Server → Client: data updates, status, errors, acks, sweep progress, snapshots

use serde::{Deserialize, Serialize};

use crate::application::{CommandOutcome, Notification, SessionRequest};
use crate::domain::bus::ConnectionState;
use crate::domain::foundation::{DeviceId, ErrorCode, SweepId, Timestamp, ViewerId};
use crate::domain::measurement::Sample;
use crate::domain::series::{NyquistPoint, SeriesKind, SeriesSnapshot};
use crate::domain::sweep::{SweepRequest, SweepStatus};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session established.
    Connected(ConnectedMessage),

    /// A sample was ingested for a joined device.
    DataUpdate(DataUpdateMessage),

    /// Device status text or bus connection change.
    StatusChanged(StatusChangedMessage),

    /// Error occurred.
    ErrorOccurred(ErrorMessage),

    /// Outcome of a command publish.
    CommandAck(CommandAckMessage),

    /// Sweep progress or termination.
    SweepStatus(SweepStatusMessage),

    /// Full series for one device.
    SeriesSnapshot(SeriesSnapshotMessage),

    /// Heartbeat response.
    Pong(PongMessage),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub viewer_id: ViewerId,
    pub bus_state: ConnectionState,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUpdateMessage {
    pub device_id: DeviceId,
    pub sample: Sample,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nyquist: Option<NyquistPoint>,
    /// Series touched by this sample.
    pub updated: Vec<SeriesKind>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangedMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_state: Option<ConnectionState>,
}

/// Error message sent to client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAckMessage {
    pub device_id: DeviceId,
    pub command: String,
    pub outcome: CommandOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStatusMessage {
    pub sweep_id: SweepId,
    pub device_id: DeviceId,
    pub status: SweepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_frequency: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSnapshotMessage {
    pub device_id: DeviceId,
    #[serde(flatten)]
    pub series: SeriesSnapshot,
}

/// Heartbeat response.
#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::Connected {
                viewer_id,
                bus_state,
                timestamp,
            } => ServerMessage::Connected(ConnectedMessage {
                viewer_id,
                bus_state,
                timestamp: timestamp.to_rfc3339(),
            }),
            Notification::DataUpdate { device, update } => {
                ServerMessage::DataUpdate(DataUpdateMessage {
                    device_id: device,
                    sample: update.sample,
                    nyquist: update.nyquist,
                    updated: update.updated_series(),
                })
            }
            Notification::StatusChanged {
                text,
                device,
                bus_state,
            } => ServerMessage::StatusChanged(StatusChangedMessage {
                text,
                device_id: device,
                bus_state,
            }),
            Notification::ErrorOccurred {
                code,
                message,
                device,
            } => ServerMessage::ErrorOccurred(ErrorMessage {
                code,
                message,
                device_id: device,
                timestamp: Timestamp::now().to_rfc3339(),
            }),
            Notification::CommandAck {
                device,
                command,
                outcome,
                reason,
            } => ServerMessage::CommandAck(CommandAckMessage {
                device_id: device,
                command,
                outcome,
                reason,
            }),
            Notification::SweepStatus {
                sweep_id,
                device,
                status,
                current_frequency,
            } => ServerMessage::SweepStatus(SweepStatusMessage {
                sweep_id,
                device_id: device,
                status,
                current_frequency,
            }),
            Notification::SeriesSnapshot { device, series } => {
                ServerMessage::SeriesSnapshot(SeriesSnapshotMessage {
                    device_id: device,
                    series,
                })
            }
            Notification::Pong => ServerMessage::Pong(PongMessage {
                timestamp: Timestamp::now().to_rfc3339(),
            }),
        }
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinDevice(DeviceRef),
    LeaveDevice(DeviceRef),
    SendCommand(SendCommandMessage),
    StartSweep(StartSweepMessage),
    AbortSweep,
    /// Request the session's full series for a device (e.g. after reconnection).
    RequestState(DeviceRef),
    /// Heartbeat request.
    Ping,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCommandMessage {
    pub device_id: String,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSweepMessage {
    pub device_id: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub wait_seconds: f64,
}

impl From<ClientMessage> for SessionRequest {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::JoinDevice(DeviceRef { device_id }) => {
                SessionRequest::JoinDevice { device_id }
            }
            ClientMessage::LeaveDevice(DeviceRef { device_id }) => {
                SessionRequest::LeaveDevice { device_id }
            }
            ClientMessage::SendCommand(SendCommandMessage { device_id, command }) => {
                SessionRequest::SendCommand { device_id, command }
            }
            ClientMessage::StartSweep(m) => SessionRequest::StartSweep(SweepRequest {
                device_id: m.device_id,
                start: m.start,
                end: m.end,
                step: m.step,
                wait_seconds: m.wait_seconds,
            }),
            ClientMessage::AbortSweep => SessionRequest::AbortSweep,
            ClientMessage::RequestState(DeviceRef { device_id }) => {
                SessionRequest::RequestState { device_id }
            }
            ClientMessage::Ping => SessionRequest::Ping,
        }
    }
}

/// Decode a text frame. Undecodable frames become `SessionRequest::Invalid`.
pub fn decode_client_frame(text: &str) -> SessionRequest {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message.into(),
        Err(e) => SessionRequest::Invalid {
            reason: format!("Invalid message: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{AggregateUpdate, SeriesAggregator};
    use serde_json::json;

    #[test]
    fn decodes_join_device() {
        let request = decode_client_frame(r#"{"type":"join_device","deviceId":"D1"}"#);
        assert_eq!(
            request,
            SessionRequest::JoinDevice {
                device_id: "D1".into()
            }
        );
    }

    #[test]
    fn decodes_start_sweep_with_camel_case_fields() {
        let frame = json!({
            "type": "start_sweep",
            "deviceId": "D1",
            "start": 100,
            "end": 103,
            "step": 1,
            "waitSeconds": 0.5
        });
        match decode_client_frame(&frame.to_string()) {
            SessionRequest::StartSweep(request) => {
                assert_eq!(request.device_id, "D1");
                assert_eq!(request.end, 103.0);
                assert_eq!(request.wait_seconds, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_unit_messages() {
        assert_eq!(decode_client_frame(r#"{"type":"ping"}"#), SessionRequest::Ping);
        assert_eq!(
            decode_client_frame(r#"{"type":"abort_sweep"}"#),
            SessionRequest::AbortSweep
        );
    }

    #[test]
    fn unknown_or_broken_frames_are_invalid() {
        for frame in [
            r#"{"type":"reboot"}"#,
            r#"{"type":"join_device"}"#,
            r#"{"type":"start_sweep","deviceId":"D1","start":"a","end":1,"step":1,"waitSeconds":0}"#,
            "not json",
        ] {
            assert!(
                matches!(decode_client_frame(frame), SessionRequest::Invalid { .. }),
                "frame {frame} should be invalid"
            );
        }
    }

    #[test]
    fn data_update_serializes_with_updated_series() {
        let mut aggregator = SeriesAggregator::new();
        aggregator.ingest(Sample::phase(0.0, 100.0));
        let update: AggregateUpdate = aggregator.ingest(Sample::magnitude(0.0, 100.0));

        let message = ServerMessage::from(Notification::DataUpdate {
            device: DeviceId::new("D1").unwrap(),
            update,
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "data_update");
        assert_eq!(json["deviceId"], "D1");
        assert_eq!(json["sample"]["kind"], "magnitude");
        assert_eq!(json["nyquist"]["re"], 1.0);
        assert_eq!(json["updated"], json!(["magnitude", "nyquist"]));
    }

    #[test]
    fn error_serializes_code_and_omits_missing_device() {
        let message = ServerMessage::from(Notification::ErrorOccurred {
            code: ErrorCode::NotConnected,
            message: "Bus is not connected".into(),
            device: None,
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "error_occurred");
        assert_eq!(json["code"], "NOT_CONNECTED");
        assert!(json.get("deviceId").is_none());
    }

    #[test]
    fn sweep_status_serializes_camel_case() {
        let message = ServerMessage::from(Notification::SweepStatus {
            sweep_id: SweepId::new(),
            device: DeviceId::new("D1").unwrap(),
            status: SweepStatus::Aborted,
            current_frequency: Some(101.0),
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "sweep_status");
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["currentFrequency"], 101.0);
    }

    #[test]
    fn command_ack_serializes_outcome() {
        let message = ServerMessage::from(Notification::CommandAck {
            device: DeviceId::new("D1").unwrap(),
            command: "S100".into(),
            outcome: CommandOutcome::Failed,
            reason: Some("Bus is not connected".into()),
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "command_ack");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "Bus is not connected");
    }

    #[test]
    fn series_snapshot_flattens_series() {
        let mut aggregator = SeriesAggregator::new();
        aggregator.ingest(Sample::magnitude(-6.0, 50.0));

        let message = ServerMessage::from(Notification::SeriesSnapshot {
            device: DeviceId::new("D1").unwrap(),
            series: aggregator.snapshot(),
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "series_snapshot");
        assert_eq!(json["magnitude"][0]["value"], -6.0);
        assert_eq!(json["phase"], json!([]));
        assert_eq!(json["nyquist"], json!([]));
    }

    #[test]
    fn connected_carries_bus_state() {
        let message = ServerMessage::from(Notification::Connected {
            viewer_id: ViewerId::new(),
            bus_state: ConnectionState::Reconnecting,
            timestamp: Timestamp::now(),
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "connected");
        assert_eq!(json["busState"], "reconnecting");
        assert!(json["viewerId"].is_string());
    }
}
