use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bode_bridge::adapters::{
    health_router, websocket_router, BusAdapter, BusAdapterConfig, HealthState, RedisTransport,
    WebSocketState,
};
use bode_bridge::application::{DeviceFeed, GatewayConfig, RoomRouter, SessionGateway};
use bode_bridge::config::{AppConfig, LogFormat, ServerConfig};
use bode_bridge::ports::DeviceBus;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!("Starting Bode bridge");

    // Bus
    let url = config.broker.connection_url()?;
    let transport = Arc::new(RedisTransport::new(&url)?);
    let (bus, inbound) = BusAdapter::new(
        transport,
        BusAdapterConfig {
            reconnect_backoff: config.broker.reconnect_backoff(),
            subscribe_status: config.broker.subscribe_status,
            ..Default::default()
        },
    );
    info!(endpoint = %bus.endpoint(), "Connecting to broker");
    bus.connect().await;
    let device_bus: Arc<dyn DeviceBus> = Arc::new(bus.clone());

    // Rooms, feed, sessions
    let rooms = Arc::new(RoomRouter::new(Arc::clone(&device_bus)));
    let gateway = Arc::new(SessionGateway::new(
        Arc::clone(&rooms),
        Arc::clone(&device_bus),
        GatewayConfig::from(&config.gateway),
    ));

    let feed_shutdown = CancellationToken::new();
    let feed = tokio::spawn(DeviceFeed::new(Arc::clone(&rooms)).run(inbound, feed_shutdown.clone()));

    // Router
    let app = Router::new()
        .merge(websocket_router().with_state(WebSocketState::new(Arc::clone(&gateway))))
        .merge(health_router().with_state(HealthState::new(
            Arc::clone(&device_bus),
            Arc::clone(&gateway),
        )))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server)),
        );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    gateway.shutdown().await;
    feed_shutdown.cancel();
    if let Err(e) = feed.await {
        warn!(error = %e, "Device feed task failed");
    }
    bus.shutdown().await;
    info!("Bode bridge stopped");

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| server.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);
    match server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
