//! The demonstration run: one pass over tools, a tool call, a resource read,
//! and prompts.
//!
//! Listing tools must succeed; every later step reports its own failure and
//! the run moves on.

use anyhow::{Context, Result};
use std::io::Write;
use tern_config::DemoSettings;
use tern_mcp::{Arguments, McpClient, Prompt, ResourceData, Tool};

/// A prompt to expand after listing prompts.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub name: String,
    pub arguments: Option<Arguments>,
}

pub async fn run(
    client: &mut McpClient,
    demo: &DemoSettings,
    prompt: Option<&PromptRequest>,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let tools = client.list_tools().await.context("Failed to list tools")?;
    writeln!(out, "Available tools:")?;
    for tool in &tools {
        writeln!(out, "{}", describe_tool(tool))?;
    }

    match client
        .call_tool(&demo.tool, demo.tool_args.clone())
        .await
    {
        Ok(result) => writeln!(
            out,
            "\nTool '{}' result: {}",
            demo.tool,
            serde_json::to_string_pretty(&result)?
        )?,
        Err(e) => writeln!(out, "Tool call failed: {e}")?,
    }

    match client.read_resource(&demo.resource_uri).await {
        Ok(data) => writeln!(out, "\nResource data: {}", format_resource(&data))?,
        Err(e) => writeln!(out, "Resource read failed: {e}")?,
    }

    match client.list_prompts().await {
        Ok(prompts) => {
            writeln!(out, "\nAvailable prompts:")?;
            for prompt in &prompts {
                writeln!(out, "{}", describe_prompt(prompt))?;
            }
        }
        Err(e) => writeln!(out, "List prompts failed: {e}")?,
    }

    if let Some(request) = prompt {
        match client
            .get_prompt(&request.name, request.arguments.clone())
            .await
        {
            Ok(messages) => {
                writeln!(out, "\nPrompt '{}':", request.name)?;
                for message in &messages {
                    writeln!(
                        out,
                        "[{}] {}",
                        serde_json::to_string(&message.role)?.trim_matches('"'),
                        message_text(&message.content)
                    )?;
                }
            }
            Err(e) => writeln!(out, "Get prompt failed: {e}")?,
        }
    }

    Ok(())
}

fn describe_tool(tool: &Tool) -> String {
    format!(
        "- {}: {}",
        tool.name,
        tool.description.as_deref().unwrap_or("No description")
    )
}

fn describe_prompt(prompt: &Prompt) -> String {
    format!(
        "- {}: {}",
        prompt.name,
        prompt.description.as_deref().unwrap_or("No description")
    )
}

fn format_resource(data: &ResourceData) -> String {
    match data {
        ResourceData::Json(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        ResourceData::Text(text) => text.clone(),
        ResourceData::Blob { data, mime_type } => format!(
            "<{} base64 chars of {}>",
            data.len(),
            mime_type.as_deref().unwrap_or("binary data")
        ),
    }
}

/// Text of a `{"type": "text"}` message content, or the raw JSON otherwise.
fn message_text(content: &serde_json::Value) -> String {
    match content.get("text").and_then(|t| t.as_str()) {
        Some(text) => text.to_string(),
        None => content.to_string(),
    }
}
