//! Streamable HTTP server: one JSON-RPC message per `POST /mcp`.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::{bind_address, cors_layer, shutdown_signal};
use crate::config::CorsOrigins;
use crate::McpHandler;

/// Builds the router. Exposed so tests can drive it without a socket.
pub fn router(handler: McpHandler, origins: &CorsOrigins) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .with_state(handler)
        .layer(cors_layer(origins))
}

/// Binds `host:port` and serves until a shutdown signal.
pub async fn serve(handler: McpHandler, host: &str, port: u16) -> Result<()> {
    let origins = handler.gateway().settings().cors_origins.clone();
    let app = router(handler, &origins);

    let addr = bind_address(host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "serving MCP over HTTP at /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn mcp_handler(State(handler): State<McpHandler>, body: String) -> Response {
    match handler.handle_text(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

pub(crate) async fn health_handler() -> &'static str {
    "ok"
}
