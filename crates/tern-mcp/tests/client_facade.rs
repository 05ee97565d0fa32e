//! Façade behaviour against an in-memory server.
//!
//! The fake records every request it receives, so each test can assert both
//! what the client returned and what it asked the server for.

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tern_mcp::protocol::{
    CallToolResult, Content, GetPromptResult, Implementation, InitializeResult,
    ListPromptsResult, ListToolsResult, PROTOCOL_VERSION, Prompt, PromptMessage,
    ReadResourceResult, ResourceContents, Role, Tool,
};
use tern_mcp::{
    Arguments, BoxFuture, ClientSession, Connector, McpClient, McpError, McpServerConfig,
    ResourceData,
};

#[derive(Default)]
struct Script {
    tools: Vec<Tool>,
    prompts: Vec<Prompt>,
    resource: Vec<ResourceContents>,
    fail_initialize: bool,
    fail_close: bool,
}

#[derive(Default)]
struct Log {
    connects: usize,
    closes: usize,
    requests: Vec<(String, Value)>,
}

#[derive(Clone, Default)]
struct FakeServer {
    script: Arc<Script>,
    log: Arc<Mutex<Log>>,
}

impl FakeServer {
    fn with(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            log: Arc::default(),
        }
    }

    fn client(&self) -> McpClient {
        McpClient::with_connector(
            McpServerConfig::for_script("mcp_server.py"),
            Box::new(self.clone()),
        )
    }

    fn record(&self, method: &str, params: Value) {
        self.log
            .lock()
            .unwrap()
            .requests
            .push((method.to_string(), params));
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.log.lock().unwrap().requests.clone()
    }

    fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|(m, _)| m).collect()
    }

    fn connects(&self) -> usize {
        self.log.lock().unwrap().connects
    }

    fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl Connector for FakeServer {
    fn connect<'a>(
        &'a self,
        _config: &'a McpServerConfig,
    ) -> BoxFuture<'a, Result<Box<dyn ClientSession>, McpError>> {
        Box::pin(async move {
            self.log.lock().unwrap().connects += 1;
            Ok(Box::new(self.clone()) as Box<dyn ClientSession>)
        })
    }
}

impl ClientSession for FakeServer {
    fn initialize(&self) -> BoxFuture<'_, Result<InitializeResult, McpError>> {
        Box::pin(async move {
            self.record("initialize", Value::Null);
            if self.script.fail_initialize {
                return Err(McpError::JsonRpc {
                    server: "fake".into(),
                    code: -32603,
                    message: "boot failure".into(),
                });
            }
            Ok(InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({}),
                server_info: Implementation {
                    name: "DocumentMCP".into(),
                    version: "0.1.0".into(),
                },
                instructions: None,
            })
        })
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<ListToolsResult, McpError>> {
        Box::pin(async move {
            self.record("tools/list", Value::Null);
            Ok(ListToolsResult {
                tools: self.script.tools.clone(),
                next_cursor: None,
            })
        })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<CallToolResult, McpError>> {
        Box::pin(async move {
            let doc_id = arguments.get("doc_id").cloned().unwrap_or_default();
            self.record("tools/call", json!({"name": name, "arguments": arguments}));
            Ok(CallToolResult {
                content: vec![Content::Text {
                    text: format!("contents of {doc_id}"),
                }],
                is_error: false,
                structured_content: None,
            })
        })
    }

    fn read_resource<'a>(
        &'a self,
        uri: &'a str,
    ) -> BoxFuture<'a, Result<ReadResourceResult, McpError>> {
        Box::pin(async move {
            self.record("resources/read", json!({"uri": uri}));
            Ok(ReadResourceResult {
                contents: self.script.resource.clone(),
            })
        })
    }

    fn list_prompts(&self) -> BoxFuture<'_, Result<ListPromptsResult, McpError>> {
        Box::pin(async move {
            self.record("prompts/list", Value::Null);
            Ok(ListPromptsResult {
                prompts: self.script.prompts.clone(),
                next_cursor: None,
            })
        })
    }

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        arguments: Arguments,
    ) -> BoxFuture<'a, Result<GetPromptResult, McpError>> {
        Box::pin(async move {
            self.record("prompts/get", json!({"name": name, "arguments": arguments}));
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: json!({"type": "text", "text": format!("run {name}")}),
                }],
            })
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), McpError>> {
        Box::pin(async move {
            self.log.lock().unwrap().closes += 1;
            if self.script.fail_close {
                return Err(McpError::Io(std::io::Error::other("kill failed")));
            }
            Ok(())
        })
    }
}

fn tool(name: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(format!("{name} tool")),
        input_schema: json!({"type": "object"}),
        extra: Default::default(),
    }
}

fn prompt(name: &str) -> Prompt {
    Prompt {
        name: name.to_string(),
        description: None,
        arguments: vec![],
    }
}

fn resource(mime_type: &str, text: &str) -> ResourceContents {
    ResourceContents {
        uri: "docs://documents".to_string(),
        mime_type: Some(mime_type.to_string()),
        text: Some(text.to_string()),
        blob: None,
    }
}

async fn assert_every_operation_is_refused(client: &mut McpClient) {
    assert!(matches!(client.list_tools().await, Err(McpError::NotConnected)));
    assert!(matches!(
        client.call_tool("read_doc_contents", Arguments::new()).await,
        Err(McpError::NotConnected)
    ));
    assert!(matches!(
        client.read_resource("docs://documents").await,
        Err(McpError::NotConnected)
    ));
    assert!(matches!(client.list_prompts().await, Err(McpError::NotConnected)));
    assert!(matches!(
        client.get_prompt("format", None).await,
        Err(McpError::NotConnected)
    ));
}

#[tokio::test]
async fn operations_before_connect_never_reach_server() {
    let server = FakeServer::default();
    let mut client = server.client();

    assert_every_operation_is_refused(&mut client).await;
    assert_eq!(server.connects(), 0);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn operations_after_cleanup_never_reach_server() {
    let server = FakeServer::default();
    let mut client = server.client();

    client.connect().await.unwrap();
    client.cleanup().await.unwrap();
    assert_every_operation_is_refused(&mut client).await;

    assert_eq!(server.methods(), ["initialize"]);
}

#[tokio::test]
async fn connect_runs_handshake_and_records_server_info() {
    let server = FakeServer::default();
    let mut client = server.client();

    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.server_info().unwrap().name, "DocumentMCP");
    assert_eq!(server.methods(), ["initialize"]);
}

#[tokio::test]
async fn second_connect_is_refused_without_leaking() {
    let server = FakeServer::default();
    let mut client = server.client();

    client.connect().await.unwrap();
    assert!(matches!(
        client.connect().await,
        Err(McpError::AlreadyConnected)
    ));

    assert_eq!(server.connects(), 1);
    assert!(client.is_connected());
    client.cleanup().await.unwrap();
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn failed_handshake_closes_session() {
    let server = FakeServer::with(Script {
        fail_initialize: true,
        ..Script::default()
    });
    let mut client = server.client();

    match client.connect().await {
        Err(McpError::JsonRpc { message, .. }) => assert_eq!(message, "boot failure"),
        other => panic!("Expected JsonRpc error, got: {other:?}"),
    }
    assert!(!client.is_connected());
    assert!(client.server_info().is_none());
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn double_cleanup_is_harmless() {
    let server = FakeServer::default();
    let mut client = server.client();

    client.connect().await.unwrap();
    assert!(client.cleanup().await.is_ok());
    assert!(!client.is_connected());
    assert!(client.cleanup().await.is_ok());
    assert!(!client.is_connected());
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn failed_close_still_disconnects() {
    let server = FakeServer::with(Script {
        fail_close: true,
        ..Script::default()
    });
    let mut client = server.client();

    client.connect().await.unwrap();
    assert!(matches!(client.cleanup().await, Err(McpError::Io(_))));
    assert!(!client.is_connected());
    assert!(client.cleanup().await.is_ok());
}

#[tokio::test]
async fn scoped_cleans_up_after_success() {
    let server = FakeServer::with(Script {
        tools: vec![tool("read_doc_contents")],
        ..Script::default()
    });
    let mut client = server.client();

    let tools = client
        .scoped(|client| Box::pin(async move { client.list_tools().await }))
        .await
        .unwrap();

    assert_eq!(tools.len(), 1);
    assert!(!client.is_connected());
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn scoped_cleans_up_after_error() {
    let server = FakeServer::default();
    let mut client = server.client();

    let result: Result<(), McpError> = client
        .scoped(|client| {
            Box::pin(async move {
                client.list_prompts().await?;
                Err(McpError::Protocol("body failed".into()))
            })
        })
        .await;

    match result {
        Err(McpError::Protocol(msg)) => assert_eq!(msg, "body failed"),
        other => panic!("Expected body error, got: {other:?}"),
    }
    assert!(!client.is_connected());
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn scoped_body_error_wins_over_close_error() {
    let server = FakeServer::with(Script {
        fail_close: true,
        ..Script::default()
    });
    let mut client = server.client();

    let result: Result<(), McpError> = client
        .scoped(|_client| Box::pin(async move { Err(McpError::NotConnected) }))
        .await;

    assert!(matches!(result, Err(McpError::NotConnected)));
    assert_eq!(server.closes(), 1);
}

#[tokio::test]
async fn scoped_reports_close_error_after_success() {
    let server = FakeServer::with(Script {
        fail_close: true,
        ..Script::default()
    });
    let mut client = server.client();

    let result = client
        .scoped(|_client| Box::pin(async move { Ok::<_, McpError>(42) }))
        .await;

    assert!(matches!(result, Err(McpError::Io(_))));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn tools_and_prompts_come_back_in_server_order() {
    let server = FakeServer::with(Script {
        tools: vec![tool("read_doc_contents"), tool("edit_document"), tool("list_docs")],
        prompts: vec![prompt("format"), prompt("summarize")],
        ..Script::default()
    });
    let mut client = server.client();
    client.connect().await.unwrap();

    let tools = client.list_tools().await.unwrap();
    let prompts = client.list_prompts().await.unwrap();

    assert_eq!(tools, server.script.tools);
    assert_eq!(prompts, server.script.prompts);
    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn call_tool_forwards_input_and_returns_raw_result() {
    let server = FakeServer::default();
    let mut client = server.client();
    client.connect().await.unwrap();

    let mut input = Arguments::new();
    input.insert("doc_id".into(), json!("report.pdf"));
    let result = client.call_tool("read_doc_contents", input).await.unwrap();

    assert!(!result.is_error);
    assert_eq!(
        result.content,
        vec![Content::Text {
            text: "contents of \"report.pdf\"".into()
        }]
    );
    let (method, params) = server.requests().pop().unwrap();
    assert_eq!(method, "tools/call");
    assert_eq!(
        params,
        json!({"name": "read_doc_contents", "arguments": {"doc_id": "report.pdf"}})
    );
}

#[tokio::test]
async fn json_resource_is_decoded() {
    let server = FakeServer::with(Script {
        resource: vec![resource("application/json", r#"{"a":1}"#)],
        ..Script::default()
    });
    let mut client = server.client();
    client.connect().await.unwrap();

    let data = client.read_resource("docs://documents").await.unwrap();
    assert_eq!(data, ResourceData::Json(json!({"a": 1})));
}

#[tokio::test]
async fn text_resource_is_returned_unchanged() {
    let server = FakeServer::with(Script {
        resource: vec![resource("text/plain", "hello")],
        ..Script::default()
    });
    let mut client = server.client();
    client.connect().await.unwrap();

    let data = client.read_resource("docs://documents/report.txt").await.unwrap();
    assert_eq!(data, ResourceData::Text("hello".into()));
}

#[tokio::test]
async fn empty_resource_is_an_error() {
    let server = FakeServer::default();
    let mut client = server.client();
    client.connect().await.unwrap();

    match client.read_resource("docs://documents").await {
        Err(McpError::EmptyResource { uri }) => assert_eq!(uri, "docs://documents"),
        other => panic!("Expected EmptyResource, got: {other:?}"),
    }
    assert!(client.is_connected());
}

#[tokio::test]
async fn get_prompt_without_arguments_sends_empty_map() {
    let server = FakeServer::default();
    let mut client = server.client();
    client.connect().await.unwrap();

    let omitted = client.get_prompt("format", None).await.unwrap();
    let empty = client.get_prompt("format", Some(Arguments::new())).await.unwrap();

    assert_eq!(omitted, empty);
    let requests = server.requests();
    let sent: Vec<_> = requests
        .iter()
        .filter(|(m, _)| m == "prompts/get")
        .map(|(_, p)| p.clone())
        .collect();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0]["arguments"], json!({}));
}

#[tokio::test]
async fn get_prompt_returns_messages() {
    let server = FakeServer::default();
    let mut client = server.client();
    client.connect().await.unwrap();

    let mut args = Arguments::new();
    args.insert("doc_id".into(), json!("report.pdf"));
    let messages = client.get_prompt("format", Some(args)).await.unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content["text"], "run format");
    let (_, params) = server.requests().pop().unwrap();
    assert_eq!(params["arguments"]["doc_id"], "report.pdf");
}
