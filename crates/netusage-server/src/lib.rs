//! History streaming server.
//!
//! Serves archived usage snapshots over a WebSocket, newest first, one chunk
//! per message, so a dashboard can draw recent traffic immediately and fill
//! in older history as it arrives.
//!
//! Protocol on `/ws`: the client sends `{"days": N}`; the server answers with
//! `{"id": 0, "data": {...}}`, `{"id": 1, ...}`, … and finishes with
//! `{"id": -1, "data": {}}` before closing.

mod config;

pub use config::ServerConfig;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;

use netusage_core::{HistoryArchive, HistoryRequest, StreamMessage};

/// Chunks buffered between the archive reader and the socket.
const CHUNK_QUEUE: usize = 4;

/// Shared server state.
struct AppState {
    archive: HistoryArchive,
    streams_started: AtomicU64,
    chunks_sent: AtomicU64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    archive_dir: String,
    archive_files: usize,
    streams_started: u64,
    chunks_sent: u64,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let archive = state.archive.clone();
    let files = tokio::task::spawn_blocking(move || archive.files().map(|f| f.len()))
        .await
        .ok()
        .and_then(Result::ok);
    Json(HealthResponse {
        status: if files.is_some() { "ok" } else { "degraded" },
        archive_dir: state.archive.dir().display().to_string(),
        archive_files: files.unwrap_or(0),
        streams_started: state.streams_started.load(Ordering::Relaxed),
        chunks_sent: state.chunks_sent.load(Ordering::Relaxed),
    })
}

async fn handle_index() -> Json<Value> {
    Json(serde_json::json!({
        "name": "netusage history server",
        "version": netusage_core::VERSION,
        "endpoints": {
            "/": "This API index",
            "/health": "Archive health and stream counters",
            "/ws": {
                "protocol": "WebSocket",
                "request": "{\"days\": N}",
                "response": "{\"id\": i, \"data\": {timestamp: {\"Us Bytes\": [...], \"Ds Bytes\": [...]}}}, newest first",
                "terminator": "{\"id\": -1, \"data\": {}}",
            }
        }
    }))
}

async fn handle_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_history(socket, state))
}

/// Wait for the client's `{"days": N}` request.
async fn read_request(receiver: &mut SplitStream<WebSocket>) -> Option<HistoryRequest> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                return match serde_json::from_str::<HistoryRequest>(text.as_str()) {
                    Ok(req) if req.days > 0 => Some(req),
                    Ok(_) => {
                        log::warn!("rejecting history request for 0 days");
                        None
                    }
                    Err(e) => {
                        log::warn!("malformed history request {:?}: {e}", text.as_str());
                        None
                    }
                };
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

fn encode(message: &StreamMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            log::error!("failed to encode chunk {}: {e}", message.id);
            None
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

async fn stream_history(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(request) = read_request(&mut receiver).await else {
        let _ = sender.send(Message::Close(None)).await;
        return;
    };
    state.streams_started.fetch_add(1, Ordering::Relaxed);
    log::info!("streaming {} days of history", request.days);

    // Archive files are read on the blocking pool and handed over one by one.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Value>(CHUNK_QUEUE);
    let archive = state.archive.clone();
    let (days, now) = (request.days, unix_now());
    let reader = tokio::task::spawn_blocking(move || {
        let chunks = match archive.chunks_within(days, now) {
            Ok(chunks) => chunks,
            Err(e) => {
                log::warn!("cannot list archive: {e}");
                return;
            }
        };
        for snapshot in chunks {
            if tx.blocking_send(snapshot.to_counter_value()).is_err() {
                break;
            }
        }
    });

    let mut id = 0i64;
    while let Some(data) = rx.recv().await {
        let Some(msg) = encode(&StreamMessage::chunk(id, data)) else {
            continue;
        };
        if sender.send(msg).await.is_err() {
            log::debug!("client disconnected after {id} chunks");
            drop(rx);
            let _ = reader.await;
            return;
        }
        state.chunks_sent.fetch_add(1, Ordering::Relaxed);
        id += 1;
    }
    let _ = reader.await;

    if let Some(end) = encode(&StreamMessage::terminator()) {
        let _ = sender.send(end).await;
    }
    let _ = sender.send(Message::Close(None)).await;
    log::info!("all {id} chunks sent");
}

/// Build the axum router.
fn build_router(archive: HistoryArchive) -> Router {
    let state = Arc::new(AppState {
        archive,
        streams_started: AtomicU64::new(0),
        chunks_sent: AtomicU64::new(0),
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/ws", get(handle_ws))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, archive: HistoryArchive, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(archive))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received, stopping");
}

/// Run the history server until Ctrl+C.
pub async fn run_server(archive: HistoryArchive, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    log::info!(
        "history server listening on ws://{addr}/ws (archive {})",
        archive.dir().display()
    );
    serve(listener, archive, shutdown_signal()).await
}
