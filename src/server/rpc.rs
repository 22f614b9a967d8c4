//! JSON-RPC 2.0 handling for the MCP tool subset:
//! `initialize`, `notifications/initialized`, `ping`, `tools/list`, `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::gateway::Dispatcher;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Handle one request. Notifications produce no response.
pub async fn handle(dispatcher: &Dispatcher, request: RpcRequest) -> Option<RpcResponse> {
    let Some(id) = request.id else {
        debug!(method = %request.method, "Notification received");
        return None;
    };

    if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
        return Some(RpcResponse::error(id, INVALID_REQUEST, "Unsupported jsonrpc version"));
    }

    let response = match request.method.as_str() {
        "initialize" => {
            let version = request
                .params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION);
            RpcResponse::result(
                id,
                json!({
                    "protocolVersion": version,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
        }
        "ping" => RpcResponse::result(id, json!({})),
        "tools/list" => RpcResponse::result(id, json!({ "tools": dispatcher.descriptors() })),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(Value::as_str) else {
                return Some(RpcResponse::error(id, INVALID_PARAMS, "Missing tool name"));
            };
            let args = request
                .params
                .get("arguments")
                .cloned()
                .unwrap_or(Value::Null);
            let result = dispatcher.dispatch(name, args).await;
            match serde_json::to_value(result) {
                Ok(value) => RpcResponse::result(id, value),
                Err(e) => RpcResponse::error(id, INVALID_PARAMS, e.to_string()),
            }
        }
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    };
    Some(response)
}

/// Handle one line of newline-delimited JSON-RPC. Returns the serialized reply, if any.
pub async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Option<String> {
    let response = match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) => handle(dispatcher, request).await?,
        Err(e) => RpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)),
    };
    serde_json::to_string(&response).ok()
}
