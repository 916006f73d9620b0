//! Network Layer: HTTP/WebSocket listener and per-socket I/O.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;

use crate::config::ServerConfig;
use crate::dashboard::system::get_stats;
use crate::server::connection_session::ConnectionSession;
use crate::TopgEngine;

/// How long a closing connection may take to flush queued frames.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

pub struct AppState {
    pub engine: TopgEngine,
    pub server: ServerConfig,
}

// ========================================
// ROUTER
// ========================================

/// WebSocket on `/` and on any unmatched path; JSON stats under `/api`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/stats", get(get_stats))
        .layer(CompressionLayer::new());

    Router::new()
        .route("/", get(ws_handler))
        .merge(api)
        .fallback(ws_handler)
        .with_state(state)
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.server.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

// ========================================
// CONNECTION HANDLER
// ========================================

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Bounded so a stalled client only ever holds `client_buffer` frames.
    let (tx, mut rx) = mpsc::channel::<Message>(state.server.client_buffer.max(1));

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                return;
            }
        }
        // Queue drained and every sender gone: flush the close handshake.
        let _ = ws_tx.close().await;
    });

    let mut session = ConnectionSession::open(state.engine.clone(), tx.clone()).await;
    let mut writer_done = false;

    let period = state.server.ping_interval;
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            // Writer gone means the socket is dead even if the reader has not noticed.
            _ = &mut send_task => {
                writer_done = true;
                break;
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                    Some(Ok(Message::Binary(data))) => {
                        session.handle_text(&String::from_utf8_lossy(&data)).await
                    }
                    // tungstenite answers pings on its own
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error for {}: {}", session.id(), e);
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                if let Err(TrySendError::Closed(_)) = tx.try_send(Message::Ping(Default::default())) {
                    break;
                }
            }
        }
    }

    // Deregister first: the registry holds the last other sender.
    drop(session);
    drop(tx);

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        tracing::debug!("Writer did not drain within {}ms, aborting", CLOSE_GRACE.as_millis());
        send_task.abort();
    }
}
