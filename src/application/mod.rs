//! Application layer - orchestration between the domain and the ports.
//!
//! - `rooms` - Device rooms and room-driven bus subscriptions
//! - `feed` - Inbound bus traffic decoded and routed to rooms
//! - `sweep` - Per-session paced frequency sweeps
//! - `gateway` - Viewer session actors composing the above

pub mod feed;
pub mod gateway;
pub mod rooms;
pub mod sweep;

pub use feed::{decode_measurement, DeviceFeed};
pub use gateway::{
    CommandOutcome, GatewayConfig, Notification, SessionChannels, SessionGateway, SessionRequest,
};
pub use rooms::{DeviceUpdate, JoinOutcome, LeaveOutcome, RoomDelivery, RoomRouter, SessionHandle};
pub use sweep::{SweepController, SweepEvent};
