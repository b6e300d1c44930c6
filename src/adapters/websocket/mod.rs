//! WebSocket adapters for the viewer control channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Viewer (browser)                            │
//! └─────────────────────────────────────────────────────────────────────┘
//!                │ ClientMessage (JSON)            ▲ ServerMessage (JSON)
//!                ▼                                 │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    ws_handler (recv task / send task)               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                │ SessionRequest                  ▲ Notification
//!                ▼                                 │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 SessionGateway → ViewerSession actor                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod messages;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use messages::{decode_client_frame, ClientMessage, ServerMessage};
