//! Connection handlers for the sockroute server.
//!
//! This module handles the connection lifecycle and feeds inbound frames into
//! one [`Session`] per connection.

use crate::app::{self, ArticleStore};
use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode as HttpStatus},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use sockroute_core::{
    ConnectionContext, ConnectionId, CorrelationId, Dispatcher, EnvelopeSink, OutboundEnvelope,
    Session, SessionError, SinkError,
};
use sockroute_protocol::codec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Header carrying the identity established by an upstream authenticator.
const USER_HEADER: &str = "x-user";

/// Bookkeeping for an open connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user: Option<String>,
    pub connected_at: Instant,
}

/// Shared server state.
pub struct AppState {
    /// The envelope dispatcher.
    pub dispatcher: Dispatcher,
    /// Server configuration.
    pub config: Config,
    /// Open connections.
    pub connections: DashMap<ConnectionId, ConnectionInfo>,
    /// Reserved connection slots, counted from before the upgrade.
    active: AtomicUsize,
}

impl AppState {
    /// Create new app state with the demo routes.
    ///
    /// # Errors
    ///
    /// Returns an error if the route table cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let dispatcher = app::build_dispatcher(Arc::new(ArticleStore::new()))
            .context("Failed to build route table")?;

        Ok(Self {
            dispatcher,
            config,
            connections: DashMap::new(),
            active: AtomicUsize::new(0),
        })
    }

    /// Reserve a connection slot, or `None` if the limit is reached.
    fn try_reserve(self: &Arc<Self>) -> Option<ConnectionSlot> {
        let limit = self.config.limits.max_connections;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < limit).then_some(active + 1)
            })
            .ok()?;
        Some(ConnectionSlot {
            state: Arc::clone(self),
        })
    }
}

/// A reserved connection slot; released on drop.
struct ConnectionSlot {
    state: Arc<AppState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone())?);

    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = router(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("sockroute server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": state.dispatcher.routes().routes().collect::<Vec<_>>(),
        "connections": state.connections.len(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(slot) = state.try_reserve() else {
        warn!(
            limit = state.config.limits.max_connections,
            "Connection limit reached"
        );
        metrics::record_rejected_connection();
        return (HttpStatus::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    let mut context = ConnectionContext::new(ConnectionId::generate());
    if let Some(user) = headers.get(USER_HEADER).and_then(|v| v.to_str().ok()) {
        context = context.with_user(user);
    }

    ws.on_upgrade(move |socket| handle_websocket(socket, context, state, slot))
}

/// Outbound half of a WebSocket, as seen by a session.
struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    async fn send_raw(&mut self, message: Message) -> Result<(), SinkError> {
        self.inner
            .send(message)
            .await
            .map_err(|e| SinkError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl EnvelopeSink for WsSink {
    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<(), SinkError> {
        let text = codec::encode(&envelope)?;
        metrics::record_message(text.len(), "outbound");
        self.send_raw(Message::Text(text)).await
    }
}

/// Handle a WebSocket connection.
async fn handle_websocket(
    socket: WebSocket,
    context: ConnectionContext,
    state: Arc<AppState>,
    _slot: ConnectionSlot,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let connection_id = context.id().clone();

    state.connections.insert(
        connection_id.clone(),
        ConnectionInfo {
            user: context.user().map(str::to_string),
            connected_at: Instant::now(),
        },
    );
    debug!(connection = %connection_id, user = ?context.user(), "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let mut session = Session::new(
        state.dispatcher.clone(),
        context,
        WsSink { inner: sender },
    );

    let idle_timeout = state.config.heartbeat.idle_timeout();
    let max_message_size = state.config.limits.max_message_size;

    loop {
        let Ok(msg) = tokio::time::timeout(idle_timeout, receiver.next()).await else {
            debug!(connection = %connection_id, "Idle timeout");
            metrics::record_error("idle_timeout");
            break;
        };

        let frame = match msg {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Ping(data))) => {
                if session.sink_mut().send_raw(Message::Pong(data)).await.is_err() {
                    break;
                }
                continue;
            }
            Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                debug!(connection = %connection_id, "Received close frame");
                break;
            }
            Some(Err(e)) => {
                warn!(connection = %connection_id, error = %e, "WebSocket error");
                metrics::record_error("websocket");
                break;
            }
            None => {
                debug!(connection = %connection_id, "WebSocket stream ended");
                break;
            }
        };

        if let Err(e) = handle_frame(&mut session, &frame, max_message_size).await {
            match e {
                SessionError::Dispatch(e) => {
                    error!(
                        connection = %connection_id,
                        error = %e,
                        "Handler failed, closing connection"
                    );
                    metrics::record_error("dispatch");
                }
                SessionError::Sink(e) => {
                    warn!(connection = %connection_id, error = %e, "Failed to send response");
                    metrics::record_error("send");
                }
            }
            break;
        }
    }

    if let Some((_, info)) = state.connections.remove(&connection_id) {
        debug!(
            connection = %connection_id,
            user = ?info.user,
            handled = session.handled(),
            duration_ms = info.connected_at.elapsed().as_millis() as u64,
            "WebSocket disconnected"
        );
    }
}

/// Dispatch one inbound frame and send its response.
async fn handle_frame(
    session: &mut Session<WsSink>,
    frame: &[u8],
    max_message_size: usize,
) -> Result<(), SessionError> {
    metrics::record_message(frame.len(), "inbound");

    if frame.len() > max_message_size {
        debug!(
            connection = %session.context().id(),
            size = frame.len(),
            limit = max_message_size,
            "Oversize frame"
        );
        metrics::record_error("oversize");
        let reply = codec::reject_with_id(CorrelationId::empty());
        session.sink_mut().send(reply.into()).await?;
        return Ok(());
    }

    let start = Instant::now();
    let delivery = session.handle_bytes(frame).await?;
    metrics::record_latency(start.elapsed().as_secs_f64());
    metrics::record_delivery(delivery);

    Ok(())
}
