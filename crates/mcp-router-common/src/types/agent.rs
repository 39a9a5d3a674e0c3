use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPermission {
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A named configuration bundling instructions, permitted tools and
/// execution policy. `tool_permissions` is keyed by MCP server id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub purpose: String,
    pub description: String,
    pub instructions: String,
    pub mcp_servers: Vec<String>,
    pub tool_permissions: BTreeMap<String, Vec<ToolPermission>>,
    pub auto_execute_tool: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_agent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentConfig {
    /// Server ids whose permission list allows `tool_name`.
    pub fn servers_for_tool<'a>(&'a self, tool_name: &'a str) -> impl Iterator<Item = &'a str> {
        self.tool_permissions.iter().filter_map(move |(server_id, tools)| {
            tools
                .iter()
                .any(|t| t.enabled && t.tool_name == tool_name)
                .then_some(server_id.as_str())
        })
    }
}

/// Partial update applied by `update_agent`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub mcp_servers: Option<Vec<String>>,
    pub tool_permissions: Option<BTreeMap<String, Vec<ToolPermission>>>,
    pub auto_execute_tool: Option<bool>,
}

impl AgentPatch {
    pub fn apply(self, agent: &mut AgentConfig) {
        if let Some(v) = self.name {
            agent.name = v;
        }
        if let Some(v) = self.purpose {
            agent.purpose = v;
        }
        if let Some(v) = self.description {
            agent.description = v;
        }
        if let Some(v) = self.instructions {
            agent.instructions = v;
        }
        if let Some(v) = self.mcp_servers {
            agent.mcp_servers = v;
        }
        if let Some(v) = self.tool_permissions {
            agent.tool_permissions = v;
        }
        if let Some(v) = self.auto_execute_tool {
            agent.auto_execute_tool = v;
        }
    }
}
