use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    #[default]
    Local,
    Remote,
}

/// Launch configuration for an MCP server: a local `stdio` command or a
/// remote URL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpServerConfig {
    pub id: String,
    pub name: String,
    pub server_type: ServerType,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub remote_url: Option<String>,
    pub bearer_token: Option<String>,
    pub auto_start: bool,
    pub disabled: bool,
}

/// Partial update applied by `update_server`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpServerPatch {
    pub name: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub remote_url: Option<String>,
    pub bearer_token: Option<String>,
    pub auto_start: Option<bool>,
    pub disabled: Option<bool>,
}

impl McpServerPatch {
    pub fn apply(self, config: &mut McpServerConfig) {
        if let Some(v) = self.name {
            config.name = v;
        }
        if let Some(v) = self.command {
            config.command = Some(v);
        }
        if let Some(v) = self.args {
            config.args = v;
        }
        if let Some(v) = self.env {
            config.env = v;
        }
        if let Some(v) = self.remote_url {
            config.remote_url = Some(v);
        }
        if let Some(v) = self.bearer_token {
            config.bearer_token = Some(v);
        }
        if let Some(v) = self.auto_start {
            config.auto_start = v;
        }
        if let Some(v) = self.disabled {
            config.disabled = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerStats {
    pub requests: u64,
    pub errors: u64,
    /// Seconds since the server reached `running`.
    pub uptime: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    #[serde(rename = "type")]
    pub state: ServerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ServerStats>,
}

/// A registered MCP server together with its last known status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    #[serde(flatten)]
    pub config: McpServerConfig,
    #[serde(default)]
    pub status: ServerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl McpServer {
    pub fn id(&self) -> &str {
        &self.config.id
    }
}
