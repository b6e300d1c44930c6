//! Health endpoint reporting the bus connection state.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::application::SessionGateway;
use crate::domain::bus::ConnectionState;
use crate::ports::DeviceBus;

/// State for the health handler.
#[derive(Clone)]
pub struct HealthState {
    pub bus: Arc<dyn DeviceBus>,
    pub gateway: Arc<SessionGateway>,
    pub started_at: Instant,
}

impl HealthState {
    pub fn new(bus: Arc<dyn DeviceBus>, gateway: Arc<SessionGateway>) -> Self {
        Self {
            bus,
            gateway,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub bus: ConnectionState,
    pub viewer_sessions: usize,
    pub uptime_seconds: u64,
}

/// `GET /health` - 200 while the bus is connected, 503 otherwise.
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthStatus>) {
    let bus = state.bus.connection_state();
    let (code, status) = if bus.is_connected() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bus,
            viewer_sessions: state.gateway.active_sessions(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}

pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health_check))
}
