//! Launch parameters for the server process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Interpreter used when no command is configured.
pub const DEFAULT_COMMAND: &str = "python";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// How to start one MCP server as a child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (default: "python").
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments to pass to the command, usually the server script path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Timeout for each request in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl McpServerConfig {
    /// Run `script` with the default interpreter.
    pub fn for_script(script: impl Into<String>) -> Self {
        Self {
            command: default_command(),
            args: vec![script.into()],
            env: HashMap::new(),
            timeout_ms: default_timeout(),
        }
    }
}
