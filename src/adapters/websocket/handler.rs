//! WebSocket upgrade handler for viewer sessions.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Upgrade to WebSocket
//! 2. Open a viewer session on the gateway
//! 3. Forward decoded client frames to the session and its notifications back
//! 4. Drop the request channel on disconnect so the session closes and
//!    leaves its rooms

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::application::{SessionChannels, SessionGateway, SessionRequest};
use crate::domain::foundation::ViewerId;

use super::messages::{decode_client_frame, ServerMessage};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub gateway: Arc<SessionGateway>,
}

impl WebSocketState {
    pub fn new(gateway: Arc<SessionGateway>) -> Self {
        Self { gateway }
    }
}

/// Handle WebSocket upgrade requests for a viewer session.
///
/// Route: `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
///
/// Runs for the lifetime of the connection. The session ends when the
/// client disconnects or the gateway shuts down.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    let SessionChannels {
        viewer_id,
        requests,
        mut notifications,
    } = state.gateway.open_session();

    // Forward session notifications to the client until the session closes
    let mut send_task = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            let msg = ServerMessage::from(notification);
            if let Err(e) = send_message(&mut sender, &msg).await {
                log_connection_error(viewer_id, "send", &e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Forward client frames to the session
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let request = match result {
                Ok(Message::Text(text)) => decode_client_frame(&text),
                Ok(Message::Binary(_)) => {
                    tracing::warn!(viewer_id = %viewer_id, "Received unsupported binary message");
                    SessionRequest::Invalid {
                        reason: "Binary frames are not supported".to_string(),
                    }
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // WebSocket protocol ping/pong - handled automatically by axum
                    continue;
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(viewer_id = %viewer_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    log_connection_error(viewer_id, "receive", &e);
                    break;
                }
            };
            if requests.send(request).await.is_err() {
                break;
            }
        }
        // Dropping `requests` here closes the session.
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            // Let the session flush its final notifications.
            if let Err(e) = send_task.await {
                log_connection_error(viewer_id, "send_task", &e);
            }
        }
    }

    tracing::debug!(viewer_id = %viewer_id, "WebSocket connection closed");
}

fn log_connection_error(viewer_id: ViewerId, stage: &'static str, error: &dyn Display) {
    tracing::debug!(viewer_id = %viewer_id, stage, error = %error, "WebSocket connection error");
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Create axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router().with_state(ws_state));
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
