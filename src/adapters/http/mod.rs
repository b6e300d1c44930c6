//! HTTP adapters - plain REST endpoints.

pub mod health;

pub use health::{health_check, health_router, HealthState, HealthStatus};
