//! Bus adapters - the device bus actor and the transports it runs over.
//!
//! - `BusAdapter` - Implements `DeviceBus`; owns reconnection and subscriptions
//! - `RedisTransport` - Redis PUBLISH/SUBSCRIBE links for production
//! - `InMemoryBroker` - Loopback broker for tests and local development

mod adapter;
mod in_memory;
mod redis_transport;

pub use adapter::{BusAdapter, BusAdapterConfig};
pub use in_memory::InMemoryBroker;
pub use redis_transport::RedisTransport;
