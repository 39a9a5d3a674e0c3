use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Sessions kept per agent by `cleanup` (valid range: 1-100000).
    pub max_sessions_per_agent: u32,
    pub cleanup_on_startup: bool,
    /// Default page size for session listings (valid range: 1-500).
    pub page_size: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_agent: 100,
            cleanup_on_startup: false,
            page_size: 10,
        }
    }
}

/// Remote workspace API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Per-request timeout for tRPC calls, in seconds (valid range: 1-300).
    pub request_timeout_secs: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}
