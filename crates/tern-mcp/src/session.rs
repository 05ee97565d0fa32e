//! The protocol session the façade delegates to.
//!
//! `ClientSession` is the seam between [`McpClient`](crate::McpClient) and a
//! concrete protocol implementation. The traits are dyn-compatible so the
//! façade holds a `Box<dyn ClientSession>` and tests can supply a fake.

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::protocol::{
    Arguments, CallToolResult, GetPromptResult, InitializeResult, ListPromptsResult,
    ListToolsResult, PROTOCOL_VERSION, ReadResourceResult,
};
use crate::transport::StdioTransport;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Client half of an MCP connection.
///
/// Every request method requires a prior successful `initialize`.
pub trait ClientSession: Send + Sync {
    /// Perform the `initialize` handshake and announce readiness.
    fn initialize(&self) -> BoxFuture<'_, Result<InitializeResult, McpError>>;

    fn list_tools(&self) -> BoxFuture<'_, Result<ListToolsResult, McpError>>;

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<CallToolResult, McpError>>;

    fn read_resource<'a>(
        &'a self,
        uri: &'a str,
    ) -> BoxFuture<'a, Result<ReadResourceResult, McpError>>;

    fn list_prompts(&self) -> BoxFuture<'_, Result<ListPromptsResult, McpError>>;

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<GetPromptResult, McpError>>;

    /// Release the connection and whatever process backs it.
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), McpError>>;
}

/// Opens sessions from launch parameters.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        config: &'a McpServerConfig,
    ) -> BoxFuture<'a, Result<Box<dyn ClientSession>, McpError>>;
}

/// Connector that spawns the server as a child process speaking over stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

impl Connector for StdioConnector {
    fn connect<'a>(
        &'a self,
        config: &'a McpServerConfig,
    ) -> BoxFuture<'a, Result<Box<dyn ClientSession>, McpError>> {
        Box::pin(async move {
            let session = StdioSession::spawn(config)?;
            Ok(Box::new(session) as Box<dyn ClientSession>)
        })
    }
}

/// MCP session over a child process's stdin/stdout.
pub struct StdioSession {
    server: String,
    transport: StdioTransport,
}

impl StdioSession {
    /// Spawn the server process. No messages are exchanged until `initialize`.
    pub fn spawn(config: &McpServerConfig) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(config)?;
        Ok(Self {
            server: config.command.clone(),
            transport,
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, McpError> {
        let resp = self.transport.send_request(method, params).await?;
        let result = resp.into_result(&self.server, method)?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse {method} response: {e}")))
    }
}

impl ClientSession for StdioSession {
    fn initialize(&self) -> BoxFuture<'_, Result<InitializeResult, McpError>> {
        Box::pin(async move {
            let params = serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "tern",
                    "version": env!("CARGO_PKG_VERSION")
                }
            });
            let init: InitializeResult = self.request("initialize", Some(params)).await?;

            if init.protocol_version != PROTOCOL_VERSION {
                tracing::debug!(
                    server_version = %init.protocol_version,
                    "MCP server negotiated a different protocol version"
                );
            }

            self.transport
                .send_notification("notifications/initialized", None)
                .await?;
            Ok(init)
        })
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<ListToolsResult, McpError>> {
        Box::pin(self.request::<ListToolsResult>("tools/list", None))
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<CallToolResult, McpError>> {
        Box::pin(async move {
            let params = serde_json::json!({
                "name": name,
                "arguments": arguments,
            });
            self.request::<CallToolResult>("tools/call", Some(params)).await
        })
    }

    fn read_resource<'a>(
        &'a self,
        uri: &'a str,
    ) -> BoxFuture<'a, Result<ReadResourceResult, McpError>> {
        Box::pin(async move {
            url::Url::parse(uri).map_err(|source| McpError::InvalidUri {
                uri: uri.to_string(),
                source,
            })?;
            let params = serde_json::json!({ "uri": uri });
            self.request::<ReadResourceResult>("resources/read", Some(params)).await
        })
    }

    fn list_prompts(&self) -> BoxFuture<'_, Result<ListPromptsResult, McpError>> {
        Box::pin(self.request::<ListPromptsResult>("prompts/list", None))
    }

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<GetPromptResult, McpError>> {
        Box::pin(async move {
            let params = serde_json::json!({
                "name": name,
                "arguments": arguments,
            });
            self.request::<GetPromptResult>("prompts/get", Some(params)).await
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), McpError>> {
        Box::pin(async move { self.transport.shutdown().await })
    }
}
