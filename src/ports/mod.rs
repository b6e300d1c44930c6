//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the outside world. Adapters implement these ports.
//!
//! ## Bus Ports
//!
//! - `BusTransport` / `BusLink` - Raw pub/sub wire client (Redis, in-memory)
//! - `DeviceBus` - Device-level subscribe/publish with connection lifecycle

mod bus_transport;
mod device_bus;

pub use bus_transport::{BusLink, BusTransport, RawMessage};
pub use device_bus::{DeviceBus, InboundMessage};
