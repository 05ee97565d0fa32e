//! Error types for MCP operations.

use thiserror::Error;

/// Errors from the client façade and the stdio session beneath it.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Client not connected. Use a scoped session or call connect() first.")]
    NotConnected,

    #[error("Client already connected. Call cleanup() before connecting again.")]
    AlreadyConnected,

    #[error("Failed to spawn MCP server '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Request '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Invalid resource URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        source: url::ParseError,
    },

    #[error("Resource '{uri}' returned no content")]
    EmptyResource { uri: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
