//! Stdio transport for MCP server communication.
//!
//! Spawns a child process and manages async communication over stdin/stdout
//! using newline-delimited JSON-RPC messages.

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::jsonrpc::{
    JsonRpcIncoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    reply_to_server_request,
};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long a child gets to exit on its own after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Requests awaiting a response, keyed by id.
///
/// `closed` is set (under the lock) once the reader has seen EOF; after that
/// no response can arrive, so nothing new may be registered.
#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

type PendingMap = Arc<Mutex<Pending>>;

/// Async stdio transport for communicating with an MCP server process.
pub(crate) struct StdioTransport {
    next_id: AtomicU64,
    write_tx: mpsc::Sender<String>,
    pending: PendingMap,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    child: Child,
    timeout_ms: u64,
}

impl StdioTransport {
    /// Spawn the configured command and start background reader/writer tasks.
    ///
    /// The child is killed if the transport is dropped without `shutdown`.
    pub(crate) fn spawn(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: config.command.clone(),
            source: e,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::Protocol(
                "Child process has no piped stdio".to_string(),
            ));
        };

        tracing::debug!(command = %config.command, args = ?config.args, "spawned MCP server");

        let pending: PendingMap = Arc::default();

        // Writer task: drains channel and writes to child stdin
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = write_rx.recv().await {
                if stdin.write_all(msg.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Reader task: reads lines from stdout, parses JSON-RPC, dispatches
        let pending_for_reader = Arc::clone(&pending);
        // Weak, so the reader never keeps stdin open past shutdown
        let reply_tx = write_tx.downgrade();
        let reader_handle = tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let message: JsonRpcIncoming = match serde_json::from_str(&line) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("Failed to parse MCP message: {e}: {line}");
                        continue;
                    }
                };
                match message {
                    JsonRpcIncoming::Response(resp) => {
                        let Some(id) = resp.id else {
                            tracing::warn!("Dropping MCP response without id: {line}");
                            continue;
                        };
                        let mut pending = pending_for_reader.lock().await;
                        if let Some(tx) = pending.waiters.remove(&id) {
                            let _ = tx.send(resp);
                        }
                    }
                    JsonRpcIncoming::Call {
                        method,
                        id: Some(id),
                    } => {
                        tracing::debug!(method = %method, "answering server request");
                        let reply = reply_to_server_request(id, &method).to_string();
                        if let Some(tx) = reply_tx.upgrade() {
                            let _ = tx.send(reply).await;
                        }
                    }
                    JsonRpcIncoming::Call { method, id: None } => {
                        tracing::trace!(method = %method, "ignoring server notification");
                    }
                }
            }
            // Server closed stdout: fail everything still waiting and refuse
            // anything new.
            let mut pending = pending_for_reader.lock().await;
            pending.closed = true;
            pending.waiters.clear();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            write_tx,
            pending,
            reader_handle,
            writer_handle,
            child,
            timeout_ms: config.timeout_ms,
        })
    }

    /// Send a JSON-RPC request and wait for the response.
    pub(crate) async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let serialized = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(McpError::Protocol(format!(
                    "Server closed the connection before '{method}' was sent"
                )));
            }
            pending.waiters.insert(id, tx);
        }

        tracing::debug!(id, method, "sending MCP request");
        if self.write_tx.send(serialized).await.is_err() {
            self.pending.lock().await.waiters.remove(&id);
            return Err(McpError::Protocol("Writer channel closed".to_string()));
        }

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(McpError::Protocol(format!(
                "Server closed the connection before answering '{method}'"
            ))),
            Err(_) => {
                self.pending.lock().await.waiters.remove(&id);
                Err(McpError::Timeout {
                    name: method.to_string(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    /// Send a JSON-RPC notification (fire-and-forget, no response expected).
    pub(crate) async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        let serialized = serde_json::to_string(&notification)?;

        self.write_tx
            .send(serialized)
            .await
            .map_err(|_| McpError::Protocol("Writer channel closed".to_string()))
    }

    /// Shut down the transport: close stdin, wait briefly, then kill.
    ///
    /// The background tasks are stopped on every path; only a failed kill
    /// is reported.
    pub(crate) async fn shutdown(self) -> Result<(), McpError> {
        let Self {
            write_tx,
            reader_handle,
            writer_handle,
            mut child,
            ..
        } = self;

        // Dropping the sender ends the writer task, which drops stdin (EOF)
        drop(write_tx);

        let graceful = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
        let outcome = match graceful {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                tracing::debug!("MCP server ignored EOF, killing it");
                child.kill().await.map_err(McpError::Io)
            }
        };

        reader_handle.abort();
        writer_handle.abort();
        outcome
    }
}
