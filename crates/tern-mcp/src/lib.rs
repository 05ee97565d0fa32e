//! Scoped MCP (Model Context Protocol) client for Tern.
//!
//! [`McpClient`] is a façade over one server: it connects, lists and calls
//! tools, reads resources, lists and expands prompts, and cleans up. The
//! protocol itself sits behind the [`ClientSession`] trait; the provided
//! [`StdioSession`] spawns the server as a child process and speaks
//! newline-delimited JSON-RPC 2.0 over its stdin/stdout.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod protocol;
pub mod session;
mod transport;

pub use client::{McpClient, ResourceData};
pub use config::McpServerConfig;
pub use error::McpError;
pub use protocol::{
    Arguments, CallToolResult, Content, Implementation, Prompt, PromptArgument, PromptMessage,
    ResourceContents, Role, Tool,
};
pub use session::{BoxFuture, ClientSession, Connector, StdioConnector, StdioSession};
