//! JSON-RPC 2.0 envelopes exchanged with the server process.

use crate::error::McpError;
use serde::{Deserialize, Serialize};

/// An outgoing JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error code for a method the receiver does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Any line the server writes.
///
/// A line with a `method` is the server calling us (a request when it has an
/// `id`, a notification otherwise); everything else answers one of our
/// requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcIncoming {
    Call {
        method: String,
        #[serde(default)]
        id: Option<serde_json::Value>,
    },
    Response(JsonRpcResponse),
}

/// Answer to a request the server sent us.
///
/// `ping` gets an empty result; nothing else is implemented.
pub fn reply_to_server_request(id: serde_json::Value, method: &str) -> serde_json::Value {
    if method == "ping" {
        serde_json::json!({"jsonrpc": "2.0", "id": id, "result": {}})
    } else {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": METHOD_NOT_FOUND,
                "message": format!("Method not found: {method}"),
            },
        })
    }
}

/// An incoming JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Split the response into its result payload or a typed error.
    ///
    /// `server` only labels the error. A response carrying neither a result
    /// nor an error is a protocol violation.
    pub fn into_result(self, server: &str, method: &str) -> Result<serde_json::Value, McpError> {
        if let Some(err) = self.error {
            return Err(McpError::JsonRpc {
                server: server.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or_else(|| {
            McpError::Protocol(format!("{method} response has neither result nor error"))
        })
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// An outgoing JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}
