//! MCP client over stdio.
//!
//! Messages are newline-delimited JSON-RPC 2.0. A reader task routes
//! responses to the waiting request by id; notifications from the server
//! are logged and dropped.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::PlatformError;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallToolResult {
    pub content: Vec<Value>,
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct McpClient {
    server: String,
    writer: Mutex<Writer>,
    pending: Pending,
    next_id: AtomicI64,
    request_timeout: Duration,
}

async fn write_message(writer: &mut Writer, msg: &Value) -> Result<(), PlatformError> {
    let mut bytes =
        serde_json::to_vec(msg).map_err(|e| PlatformError::Mcp(format!("serialize: {e}")))?;
    bytes.push(b'\n');
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| PlatformError::Mcp(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| PlatformError::Mcp(format!("flush failed: {e}")))
}

fn spawn_reader_loop<R>(reader: R, server: String, pending: Pending)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let msg: Value = match serde_json::from_str(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            debug!(server = %server, error = %e, "non-JSON output from server");
                            continue;
                        }
                    };
                    let id = msg.get("id").and_then(Value::as_i64);
                    match (id, msg.get("method")) {
                        (Some(id), None) => {
                            if let Some(sender) = pending.lock().await.remove(&id) {
                                let _ = sender.send(msg);
                            } else {
                                debug!(server = %server, id, "response for unknown request");
                            }
                        }
                        (_, Some(method)) => {
                            debug!(server = %server, method = %method, "server message ignored");
                        }
                        (None, None) => {}
                    }
                }
                Ok(None) => {
                    debug!(server = %server, "server stdout closed");
                    break;
                }
                Err(e) => {
                    warn!(server = %server, error = %e, "error reading server output");
                    break;
                }
            }
        }
        // Wakes every waiter with a closed channel.
        pending.lock().await.clear();
    });
}

impl McpClient {
    pub fn new<W, R>(server: impl Into<String>, writer: W, reader: R, request_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let server = server.into();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        spawn_reader_loop(reader, server.clone(), pending.clone());
        Self {
            server,
            writer: Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicI64::new(1),
            request_timeout,
        }
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, PlatformError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        if let Err(e) = write_message(&mut *self.writer.lock().await, &msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(PlatformError::Mcp(format!(
                    "{} closed before answering {method}",
                    self.server
                )))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(PlatformError::Mcp(format!(
                    "{method} timed out after {:?}",
                    self.request_timeout
                )));
            }
        };

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(PlatformError::Mcp(format!("{method}: {message}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<(), PlatformError> {
        let msg = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        write_message(&mut *self.writer.lock().await, &msg).await
    }

    /// `initialize` request followed by the `notifications/initialized`
    /// notification.
    pub async fn initialize(&self) -> Result<Value, PlatformError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "mcp-router",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;
        self.notify("notifications/initialized", json!({})).await?;
        Ok(result)
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>, PlatformError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools).map_err(|e| PlatformError::Decode(e.to_string()))
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<CallToolResult, PlatformError> {
        let result = self
            .request(
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| PlatformError::Decode(e.to_string()))
    }
}
