//! MCP client façade — one server, scoped lifetime.
//!
//! `McpClient` owns at most one live [`ClientSession`]. `connect` produces it,
//! `cleanup` consumes it, and every data-access call checks for it before
//! touching the server. Operations take `&mut self`, so a client cannot be
//! driven from two tasks at once.

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::protocol::{
    Arguments, CallToolResult, Implementation, JSON_MIME_TYPE, Prompt, PromptMessage,
    ResourceContents, Tool,
};
use crate::session::{BoxFuture, ClientSession, Connector, StdioConnector};

/// Decoded payload of a resource read.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// Text declared as `application/json`, parsed.
    Json(serde_json::Value),
    /// Text of any other (or no) MIME type, unchanged.
    Text(String),
    /// Base64 binary content.
    Blob {
        data: String,
        mime_type: Option<String>,
    },
}

impl ResourceData {
    /// Decode the first content element; any further elements are ignored.
    pub fn from_contents(uri: &str, contents: Vec<ResourceContents>) -> Result<Self, McpError> {
        let first = contents
            .into_iter()
            .next()
            .ok_or_else(|| McpError::EmptyResource {
                uri: uri.to_string(),
            })?;

        match (first.text, first.blob) {
            (Some(text), _) if first.mime_type.as_deref() == Some(JSON_MIME_TYPE) => {
                Ok(Self::Json(serde_json::from_str(&text)?))
            }
            (Some(text), _) => Ok(Self::Text(text)),
            (None, Some(data)) => Ok(Self::Blob {
                data,
                mime_type: first.mime_type,
            }),
            (None, None) => Err(McpError::Protocol(format!(
                "Resource '{uri}' content has neither text nor blob"
            ))),
        }
    }
}

/// Client for a single MCP server.
pub struct McpClient {
    config: McpServerConfig,
    connector: Box<dyn Connector>,
    session: Option<Box<dyn ClientSession>>,
    server_info: Option<Implementation>,
}

impl McpClient {
    /// A disconnected client that will spawn the server over stdio.
    pub fn new(config: McpServerConfig) -> Self {
        Self::with_connector(config, Box::new(StdioConnector))
    }

    /// A disconnected client that opens sessions through `connector`.
    pub fn with_connector(config: McpServerConfig, connector: Box<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            session: None,
            server_info: None,
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Server name and version from the handshake, while connected.
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Start the server and run the initialize handshake.
    ///
    /// Fails with [`McpError::AlreadyConnected`] instead of replacing a live
    /// session. If the handshake fails, the new session is closed again and
    /// the client stays disconnected.
    pub async fn connect(&mut self) -> Result<(), McpError> {
        if self.session.is_some() {
            return Err(McpError::AlreadyConnected);
        }

        let session = self.connector.connect(&self.config).await?;
        let handshake = session.initialize().await;
        let init = match handshake {
            Ok(init) => init,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::warn!("Failed to close MCP session after handshake error: {close_err}");
                }
                return Err(e);
            }
        };

        tracing::info!(
            "MCP server '{}' connected ({} {})",
            self.config.command,
            init.server_info.name,
            init.server_info.version
        );
        self.server_info = Some(init.server_info);
        self.session = Some(session);
        Ok(())
    }

    /// Close the session if there is one. Idempotent.
    ///
    /// The client is disconnected afterwards even when closing fails; the
    /// close error is still returned.
    pub async fn cleanup(&mut self) -> Result<(), McpError> {
        self.server_info = None;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        tracing::info!("Disconnecting MCP server '{}'", self.config.command);
        session.close().await
    }

    /// Connect, run `body`, then clean up whatever `body` returned.
    ///
    /// An error from `body` takes precedence over an error from cleanup.
    ///
    /// ```no_run
    /// # async fn demo() -> Result<(), tern_mcp::McpError> {
    /// use tern_mcp::{McpClient, McpServerConfig};
    ///
    /// let mut client = McpClient::new(McpServerConfig::for_script("mcp_server.py"));
    /// let tools = client
    ///     .scoped(|client| Box::pin(async move { client.list_tools().await }))
    ///     .await?;
    /// println!("{} tools", tools.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut McpClient) -> BoxFuture<'c, Result<T, E>>,
        E: From<McpError>,
    {
        self.connect().await?;
        let outcome = body(self).await;
        let closed = self.cleanup().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!("Failed to close MCP session: {close_err}");
                }
                Err(e)
            }
        }
    }

    fn session(&self) -> Result<&dyn ClientSession, McpError> {
        self.session.as_deref().ok_or(McpError::NotConnected)
    }

    /// Tools advertised by the server, in server order.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, McpError> {
        let result = self.session()?.list_tools().await?;
        Ok(result.tools)
    }

    /// Invoke a tool. The result is returned as the server sent it,
    /// including tool-level failures (`is_error`).
    pub async fn call_tool(
        &mut self,
        name: &str,
        input: Arguments,
    ) -> Result<CallToolResult, McpError> {
        self.session()?.call_tool(name, input).await
    }

    /// Read a resource and decode its first content element.
    pub async fn read_resource(&mut self, uri: &str) -> Result<ResourceData, McpError> {
        let result = self.session()?.read_resource(uri).await?;
        ResourceData::from_contents(uri, result.contents)
    }

    /// Prompts advertised by the server, in server order.
    pub async fn list_prompts(&mut self) -> Result<Vec<Prompt>, McpError> {
        let result = self.session()?.list_prompts().await?;
        Ok(result.prompts)
    }

    /// Expand a prompt. `None` sends an empty argument map.
    pub async fn get_prompt(
        &mut self,
        name: &str,
        arguments: Option<Arguments>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let arguments = arguments.unwrap_or_default();
        let result = self.session()?.get_prompt(name, arguments).await?;
        Ok(result.messages)
    }
}
