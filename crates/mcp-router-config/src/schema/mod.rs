//! Configuration schema types for MCP Router.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod database;
mod engine;
mod logging;
mod sessions;

pub use database::*;
pub use engine::*;
pub use logging::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for MCP Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct RouterConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub tools: ToolsConfig,
    pub sessions: SessionsConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}
