//! Multi-tier TOML configuration for Tern.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tern_mcp::{Arguments, McpServerConfig};

/// Server script run when nothing else is configured.
pub const DEFAULT_SERVER_SCRIPT: &str = "mcp_server.py";

/// Tool the demo calls by default.
pub const DEFAULT_TOOL: &str = "read_doc_contents";

/// Resource the demo reads by default.
pub const DEFAULT_RESOURCE_URI: &str = "docs://documents";

/// Resolved configuration for a Tern run.
#[derive(Debug, Clone)]
pub struct TernConfig {
    pub server: McpServerConfig,
    pub demo: DemoSettings,
    pub config_dir: PathBuf,
}

/// What the demonstration routine exercises.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSettings {
    pub tool: String,
    pub tool_args: Arguments,
    pub resource_uri: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        let mut tool_args = Arguments::new();
        tool_args.insert("doc_id".to_string(), "report.pdf".into());
        Self {
            tool: DEFAULT_TOOL.to_string(),
            tool_args,
            resource_uri: DEFAULT_RESOURCE_URI.to_string(),
        }
    }
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub demo: DemoFileSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoFileSettings {
    pub tool: Option<String>,
    pub tool_args: Option<Arguments>,
    pub resource_uri: Option<String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file; unlike the global file it must parse.
    pub config_file: Option<PathBuf>,
    pub command: Option<String>,
    /// Replaces the configured argument list with just this script.
    pub server_script: Option<String>,
    pub timeout_ms: Option<u64>,
    pub tool: Option<String>,
    /// JSON object text.
    pub tool_args: Option<String>,
    pub resource_uri: Option<String>,
}

impl TernConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`TERN_SERVER_COMMAND`, `TERN_TIMEOUT_MS`)
    /// 3. Config file (`--config`, else ~/.tern/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = match &overrides.config_file {
            Some(path) => read_settings_file(path)?,
            None => load_settings_file(&config_dir.join("config.toml")),
        };
        Self::resolve(overrides, settings, config_dir, |key| std::env::var(key).ok())
    }

    fn resolve(
        overrides: CliOverrides,
        settings: SettingsFile,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let command = overrides
            .command
            .or_else(|| env("TERN_SERVER_COMMAND"))
            .or(settings.server.command)
            .unwrap_or_else(|| tern_mcp::config::DEFAULT_COMMAND.to_string());

        let args = match overrides.server_script {
            Some(script) => vec![script],
            None => settings
                .server
                .args
                .unwrap_or_else(|| vec![DEFAULT_SERVER_SCRIPT.to_string()]),
        };

        let env_timeout = env("TERN_TIMEOUT_MS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "TERN_TIMEOUT_MS".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        let timeout_ms = overrides
            .timeout_ms
            .or(env_timeout)
            .or(settings.server.timeout_ms)
            .unwrap_or(tern_mcp::config::DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        let defaults = DemoSettings::default();
        let tool_args = match overrides.tool_args {
            Some(raw) => parse_tool_args(&raw)?,
            None => settings.demo.tool_args.unwrap_or(defaults.tool_args),
        };
        let demo = DemoSettings {
            tool: overrides
                .tool
                .or(settings.demo.tool)
                .unwrap_or(defaults.tool),
            tool_args,
            resource_uri: overrides
                .resource_uri
                .or(settings.demo.resource_uri)
                .unwrap_or(defaults.resource_uri),
        };

        Ok(TernConfig {
            server: McpServerConfig {
                command,
                args,
                env: settings.server.env,
                timeout_ms,
            },
            demo,
            config_dir,
        })
    }
}

/// Get the Tern config directory path (~/.tern/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TERN_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tern")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

/// Read a settings file the user asked for by name; any failure is an error.
fn read_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn parse_tool_args(raw: &str) -> Result<Arguments, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
        key: "tool_args".into(),
        message: format!("expected a JSON object: {e}"),
    })
}
