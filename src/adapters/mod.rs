//! Adapters - Implementations of ports for external systems.
//!
//! - `bus` - Device bus actor, Redis transport, in-memory broker
//! - `websocket` - Viewer control channel
//! - `http` - Health endpoint

pub mod bus;
pub mod http;
pub mod websocket;

pub use bus::{BusAdapter, BusAdapterConfig, InMemoryBroker, RedisTransport};
pub use http::{health_router, HealthState};
pub use websocket::{websocket_router, WebSocketState};
