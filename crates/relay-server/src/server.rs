//! HTTP/WebSocket listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Upgrades `GET /ws` requests to WebSockets, refusing them once
//!   `max_clients` connections are open.
//! - Assigns each connection a `ConnectionId`.
//! - Spawns:
//!   - a per-connection task to handle I/O,
//!   - a single central relay task that owns the `Relay`.
//!
//! The per-connection logic and relay loop live in `client` and
//! `relay_task` respectively.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use relay_core::ConnectionId;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::client;
use crate::config::{Config, Heartbeat};
use crate::relay_task;
use crate::types::{OutboundRx, OutboundTx, RelayRequest, RelayTx};

/// Process-wide counter for assigning unique `ConnectionId`s.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    ConnectionId(id)
}

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    relay_tx: RelayTx,

    /// One permit per open connection.
    slots: Arc<Semaphore>,

    heartbeat: Option<Heartbeat>,
}

impl AppState {
    pub fn new(relay_tx: RelayTx, config: &Config) -> Self {
        AppState {
            relay_tx,
            slots: Arc::new(Semaphore::new(config.max_clients)),
            heartbeat: config.heartbeat,
        }
    }
}

/// Build the router: WebSocket endpoint, health check, CORS for the one trusted origin.
pub fn router(state: AppState, allowed_origin: &str) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("invalid allowed origin {allowed_origin:?}"))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST]);

    Ok(Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state))
}

/// Run the server with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (relay_tx, relay_handle) = relay_task::spawn(config.policy);

    let state = AppState::new(relay_tx, &config);
    let app = router(state, &config.allowed_origin)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    // Open WebSocket tasks still hold relay senders; don't wait for them.
    relay_handle.abort();
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Ok(permit) = state.slots.clone().try_acquire_owned() else {
        warn!("Rejecting connection: max_clients reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let connection_id = next_connection_id();

    // Create outbound channel for this connection.
    let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();

    // Join the relay before the handshake response goes out, so a client
    // whose handshake completed is already a broadcast recipient.
    let req = RelayRequest::Connect {
        connection_id,
        outbound: out_tx,
    };
    if state.relay_tx.send(req).is_err() {
        error!(connection = %connection_id, "relay channel closed, refusing connection");
        return (StatusCode::SERVICE_UNAVAILABLE, "relay unavailable").into_response();
    }

    let relay_tx = state.relay_tx.clone();
    ws.on_failed_upgrade(move |err: axum::Error| {
        warn!(connection = %connection_id, error = %err, "websocket upgrade failed");
        let _ = relay_tx.send(RelayRequest::Disconnect { connection_id });
    })
    .on_upgrade(move |socket| handle_socket(socket, connection_id, state, out_rx, permit))
}

async fn handle_socket(
    socket: WebSocket,
    connection_id: ConnectionId,
    state: AppState,
    out_rx: OutboundRx,
    _permit: OwnedSemaphorePermit,
) {
    info!(connection = %connection_id, "connection opened");
    client::run_client(connection_id, socket, state.relay_tx, out_rx, state.heartbeat).await;
    info!(connection = %connection_id, "connection closed");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
