//! Model Context Protocol front-end.
//!
//! [`McpHandler`] turns JSON-RPC 2.0 messages into gateway calls. It knows
//! nothing about transports: stdio, streamable HTTP and SSE all feed it one
//! message at a time and write back whatever it returns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::tool::{error_payload, parse_arguments, search_tool, SEARCH_TOOL};
use crate::{Gateway, GatewayError};

/// Protocol revision announced when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "google-search";

/// JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Bad method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Dispatches MCP requests to the gateway.
#[derive(Clone)]
pub struct McpHandler {
    gateway: Arc<Gateway>,
}

impl McpHandler {
    /// Creates a handler for `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Handles one raw message. Returns `None` for notifications.
    pub async fn handle_text(&self, text: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => Some(error_response(
                Value::Null,
                codes::PARSE_ERROR,
                &format!("parse error: {}", e),
            )),
        }
    }

    /// Handles one parsed message. Returns `None` for notifications.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        if message.is_array() {
            return Some(error_response(
                Value::Null,
                codes::INVALID_REQUEST,
                "batch requests are not supported",
            ));
        }

        let request: RpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return Some(error_response(
                    Value::Null,
                    codes::INVALID_REQUEST,
                    &format!("invalid request: {}", e),
                ))
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };

        debug!(method = %request.method, "request");
        let outcome = match request.method.as_str() {
            "initialize" => Ok(initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": [search_tool()] })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((
                codes::METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => error_response(id, code, &message),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i64, String)> {
        let params: CallParams = params
            .ok_or_else(|| "missing params".to_string())
            .and_then(|p| serde_json::from_value(p).map_err(|e| e.to_string()))
            .map_err(|e| (codes::INVALID_PARAMS, format!("invalid tools/call params: {}", e)))?;

        if params.name != SEARCH_TOOL {
            return Err((
                codes::INVALID_PARAMS,
                format!("unknown tool: {}", params.name),
            ));
        }

        let outcome = match parse_arguments(params.arguments) {
            Ok(request) => self.gateway.search(request).await,
            Err(e) => Err(e),
        };

        Ok(tool_result(outcome.and_then(|result| structured(&result))))
    }
}

/// Serializes a search result. Only upstream passthrough fields can fail to
/// encode, so a failure is reported as an upstream error.
fn structured<T: Serialize>(value: &T) -> crate::Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::upstream(200, &format!("cannot encode search result: {}", e)))
}

/// Wraps a search outcome as an MCP tool result.
fn tool_result(outcome: crate::Result<Value>) -> Value {
    match outcome {
        Ok(structured) => json!({
            "content": [{ "type": "text", "text": structured.to_string() }],
            "structuredContent": structured,
            "isError": false,
        }),
        Err(err) => {
            warn!(kind = err.kind(), "tool call failed");
            json!({
                "content": [{ "type": "text", "text": err.to_string() }],
                "structuredContent": error_payload(&err),
                "isError": true,
            })
        }
    }
}

fn initialize(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);

    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
