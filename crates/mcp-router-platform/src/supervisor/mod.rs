//! Spawns and tracks stdio MCP servers.
//!
//! Each started server gets a child process, an `McpClient` bound to its
//! stdin/stdout, and a status entry. Stopping kills the child.

pub mod client;

use mcp_router_common::{now_millis, McpServerConfig, ServerState, ServerStats, ServerStatus, ServerType};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use client::{CallToolResult, McpClient, McpTool};

use crate::error::PlatformError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct Running {
    child: Child,
    client: Arc<McpClient>,
    started: Instant,
    connected_at: i64,
}

#[derive(Default)]
struct Entry {
    state: ServerState,
    error: Option<String>,
    running: Option<Running>,
    requests: u64,
    errors: u64,
}

impl Entry {
    fn status(&self) -> ServerStatus {
        ServerStatus {
            state: self.state,
            error: self.error.clone(),
            connected_at: self.running.as_ref().map(|r| r.connected_at),
            stats: Some(ServerStats {
                requests: self.requests,
                errors: self.errors,
                uptime: self
                    .running
                    .as_ref()
                    .map(|r| r.started.elapsed().as_secs())
                    .unwrap_or(0),
            }),
        }
    }
}

pub struct ServerSupervisor {
    entries: Mutex<HashMap<String, Entry>>,
    request_timeout: Duration,
}

impl Default for ServerSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl ServerSupervisor {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            request_timeout,
        }
    }

    /// Starts `config`. `Ok(false)` when it is already starting or running.
    pub async fn start(&self, config: &McpServerConfig) -> Result<bool, PlatformError> {
        if config.server_type == ServerType::Remote {
            return Err(PlatformError::Unsupported(format!(
                "remote MCP server {} cannot be started locally",
                config.name
            )));
        }
        if config.disabled {
            return Err(PlatformError::InvalidState(format!(
                "server {} is disabled",
                config.name
            )));
        }
        let command = match config.command.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => cmd.to_string(),
            _ => {
                return Err(PlatformError::InvalidState(format!(
                    "server {} has no command",
                    config.name
                )))
            }
        };

        {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(config.id.clone()).or_default();
            if matches!(entry.state, ServerState::Starting | ServerState::Running) {
                return Ok(false);
            }
            entry.state = ServerState::Starting;
            entry.error = None;
        }

        match self.launch(config, &command).await {
            Ok(running) => {
                let mut entries = self.entries.lock().await;
                let entry = entries.entry(config.id.clone()).or_default();
                entry.state = ServerState::Running;
                entry.running = Some(running);
                info!(server_id = %config.id, name = %config.name, "MCP server running");
                Ok(true)
            }
            Err(e) => {
                let mut entries = self.entries.lock().await;
                let entry = entries.entry(config.id.clone()).or_default();
                entry.state = ServerState::Error;
                entry.error = Some(e.to_string());
                warn!(server_id = %config.id, error = %e, "MCP server failed to start");
                Err(e)
            }
        }
    }

    async fn launch(&self, config: &McpServerConfig, command: &str) -> Result<Running, PlatformError> {
        let spawn_error = |message: String| PlatformError::Spawn {
            server: config.name.clone(),
            message,
        };

        let mut child = Command::new(command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            let server_id = config.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if !line.is_empty() {
                        debug!(server_id = %server_id, "stderr: {line}");
                    }
                }
            });
        }

        let client = Arc::new(McpClient::new(
            config.name.clone(),
            stdin,
            stdout,
            self.request_timeout,
        ));
        if let Err(e) = client.initialize().await {
            let _ = child.kill().await;
            return Err(e);
        }

        Ok(Running {
            child,
            client,
            started: Instant::now(),
            connected_at: now_millis(),
        })
    }

    /// Kills the server process. `Ok(false)` when it was not running.
    pub async fn stop(&self, id: &str) -> Result<bool, PlatformError> {
        let running = {
            let mut entries = self.entries.lock().await;
            let Some(entry) = entries.get_mut(id) else {
                return Ok(false);
            };
            entry.state = ServerState::Stopped;
            entry.error = None;
            entry.running.take()
        };
        let Some(mut running) = running else {
            return Ok(false);
        };
        if let Err(e) = running.child.kill().await {
            warn!(server_id = %id, error = %e, "failed to kill MCP server");
        }
        info!(server_id = %id, "MCP server stopped");
        Ok(true)
    }

    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                warn!(server_id = %id, error = %e, "error stopping MCP server");
            }
        }
    }

    pub async fn status(&self, id: &str) -> ServerStatus {
        self.entries
            .lock()
            .await
            .get(id)
            .map(Entry::status)
            .unwrap_or_default()
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.entries
            .lock()
            .await
            .get(id)
            .is_some_and(|e| e.state == ServerState::Running)
    }

    /// Client of a running server.
    pub async fn client(&self, id: &str) -> Option<Arc<McpClient>> {
        let entries = self.entries.lock().await;
        let entry = entries.get(id)?;
        entry.running.as_ref().map(|r| r.client.clone())
    }

    /// Counts one request against `id`.
    pub async fn record(&self, id: &str, ok: bool) {
        if let Some(entry) = self.entries.lock().await.get_mut(id) {
            entry.requests += 1;
            if !ok {
                entry.errors += 1;
            }
        }
    }
}

/// Shell MCP server that answers `tools/call` with "pong" and every other
/// request with an initialize result.
#[cfg(all(test, unix))]
pub(crate) const FAKE_SERVER_SCRIPT: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"tools/call"'*) printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"pong"}],"isError":false}}\n' "$id" ;;
    *) printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}\n' "$id" ;;
  esac
done
"#;
