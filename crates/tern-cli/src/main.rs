//! Tern CLI — exercise an MCP server from the terminal.

mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use demo::PromptRequest;
use std::io;
use std::path::PathBuf;
use tern_config::{CliOverrides, TernConfig};
use tern_mcp::{Arguments, McpClient};

#[derive(Parser)]
#[command(
    name = "tern",
    version,
    about = "Connect to an MCP server and walk its tools, resources and prompts"
)]
struct Cli {
    /// Server script to run (default: mcp_server.py)
    script: Option<String>,

    /// Interpreter or executable that runs the server (default: python)
    #[arg(long)]
    command: Option<String>,

    /// Config file to use instead of ~/.tern/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Tool to call
    #[arg(long)]
    tool: Option<String>,

    /// Tool input as a JSON object
    #[arg(long)]
    tool_args: Option<String>,

    /// Resource URI to read
    #[arg(long)]
    resource: Option<String>,

    /// Also expand this prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Prompt arguments as a JSON object
    #[arg(long, requires = "prompt")]
    prompt_args: Option<String>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let prompt = cli
        .prompt
        .map(|name| -> Result<PromptRequest> {
            let arguments = cli
                .prompt_args
                .as_deref()
                .map(|raw| serde_json::from_str::<Arguments>(raw))
                .transpose()
                .context("--prompt-args must be a JSON object")?;
            Ok(PromptRequest { name, arguments })
        })
        .transpose()?;

    let config = TernConfig::load(CliOverrides {
        config_file: cli.config,
        command: cli.command,
        server_script: cli.script,
        timeout_ms: cli.timeout_ms,
        tool: cli.tool,
        tool_args: cli.tool_args,
        resource_uri: cli.resource,
    })
    .context("Failed to load configuration")?;

    tracing::debug!(
        command = %config.server.command,
        args = ?config.server.args,
        config_dir = %config.config_dir.display(),
        "starting MCP server"
    );

    let settings = config.demo;
    let mut client = McpClient::new(config.server);
    client
        .scoped(move |client| {
            Box::pin(async move {
                let mut out = io::stdout();
                demo::run(client, &settings, prompt.as_ref(), &mut out).await
            })
        })
        .await
}
