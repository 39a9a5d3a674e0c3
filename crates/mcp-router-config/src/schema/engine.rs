//! Completion engine and tool execution configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENGINE_URL: &str = "https://mcp-router.net/api/agent/chat/use";

/// Hosted chat endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api_url: String,
    /// Longest wait for the next engine event, in seconds (valid range: 5-3600).
    pub response_timeout_secs: u32,
    /// TCP connect timeout in seconds (valid range: 1-120).
    pub connect_timeout_secs: u32,
    /// Tool round-trips allowed per exchange (valid range: 1-50).
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_ENGINE_URL.to_string(),
            response_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_steps: 5,
        }
    }
}

/// Tool execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Bound on one tool execution, in seconds (valid range: 1-3600).
    pub execution_timeout_secs: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            execution_timeout_secs: 60,
        }
    }
}
