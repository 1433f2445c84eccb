//! Server-sent events transport.
//!
//! `GET /sse` opens a session. Its first event, `endpoint`, tells the client
//! where to post messages; responses come back on the stream as `message`
//! events. A session ends when its stream is dropped.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use super::http::health_handler;
use super::{bind_address, cors_layer, shutdown_signal};
use crate::config::CorsOrigins;
use crate::McpHandler;

/// Path clients post messages to.
pub const MESSAGES_PATH: &str = "/messages";

type Sessions = Arc<Mutex<HashMap<String, mpsc::Sender<Value>>>>;

/// Router state: the handler plus the open sessions.
#[derive(Clone)]
pub struct SseState {
    handler: McpHandler,
    sessions: Sessions,
}

impl SseState {
    /// Creates state with no open sessions.
    pub fn new(handler: McpHandler) -> Self {
        Self {
            handler,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::Sender<Value>> {
        self.sessions.lock().ok()?.get(session_id).cloned()
    }
}

/// Removes the session when its stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&self.id);
        }
        debug!(session_id = %self.id, "sse session closed");
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Builds the router around existing state.
pub fn router(state: SseState, origins: &CorsOrigins) -> Router {
    Router::new()
        .route("/sse", get(stream_handler))
        .route(MESSAGES_PATH, post(message_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(cors_layer(origins))
}

/// Binds `host:port` and serves until a shutdown signal.
pub async fn serve(handler: McpHandler, host: &str, port: u16) -> Result<()> {
    let origins = handler.gateway().settings().cors_origins.clone();
    let app = router(SseState::new(handler), &origins);

    let addr = bind_address(host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "serving MCP over SSE at /sse");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("SSE server failed")
}

async fn stream_handler(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let session_id = hex::encode(rand::random::<[u8; 16]>());
    let (tx, rx) = mpsc::channel::<Value>(32);
    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.insert(session_id.clone(), tx);
    }
    debug!(session_id = %session_id, "sse session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?session_id={}", MESSAGES_PATH, session_id));
    let guard = SessionGuard {
        id: session_id,
        sessions: state.sessions.clone(),
    };

    let messages = ReceiverStream::new(rx).map(move |message| {
        let _session = &guard;
        Ok(Event::default().event("message").data(message.to_string()))
    });
    let events = stream::once(async move { Ok(endpoint) }).chain(messages);

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn message_handler(
    State(state): State<SseState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    let Some(tx) = state.sender(&query.session_id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let handler = state.handler.clone();
    tokio::spawn(async move {
        if let Some(response) = handler.handle_text(&body).await {
            if tx.send(response).await.is_err() {
                debug!("sse session gone, dropping response");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
