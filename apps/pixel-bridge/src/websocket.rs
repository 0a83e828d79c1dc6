use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use pixel_bridge_core::ServerMessage;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;

/// State shared by every editor connection.
#[derive(Clone)]
pub struct SocketState {
    ingestor: Ingestor,
    max_message_bytes: usize,
    metrics: Option<PrometheusHandle>,
}

impl SocketState {
    pub fn new(ingestor: Ingestor, max_message_bytes: usize) -> Self {
        Self {
            ingestor,
            max_message_bytes,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn router(state: SocketState) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serves the editor surface on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: SocketState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("websocket server exited with error")
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<SocketState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn websocket_handler(
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    State(state): State<SocketState>,
) -> Response {
    let limit = state.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state, remote_addr))
}

/// Frames from one connection are handled strictly in arrival order; the
/// next frame is not read until the previous reply has been queued.
async fn handle_socket(socket: WebSocket, state: SocketState, remote_addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "failed to serialize reply"),
            }
        }
        debug!(%remote_addr, "reply writer finished");
    });

    info!(%remote_addr, "editor connected");

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%remote_addr, error = %err, "websocket receive error");
                break;
            }
        };

        let reply = match frame {
            Message::Text(text) => state.ingestor.handle_text(&text).await,
            Message::Binary(data) => match String::from_utf8(data) {
                Ok(text) => state.ingestor.handle_text(&text).await,
                Err(err) => {
                    warn!(%remote_addr, error = %err, "binary frame is not UTF-8");
                    ServerMessage::error(format!("Failed to parse message data: {err}"))
                }
            },
            Message::Close(frame) => {
                debug!(
                    %remote_addr,
                    reason = ?frame.map(|f| f.reason.to_string()),
                    "client closed websocket"
                );
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if tx.send(reply).is_err() {
            break;
        }
    }

    // Let queued replies drain before the socket goes away.
    drop(tx);
    let _ = writer.await;
    info!(%remote_addr, "editor disconnected");
}
