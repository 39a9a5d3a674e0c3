//! MCP Router configuration system.
//!
//! TOML configuration with validation. All config sections use serde
//! defaults so partial configs work out of the box.
//!
//! ```rust,no_run
//! use mcp_router_config::load_config;
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config.engine.api_url);
//! ```

pub mod paths;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{RouterConfig, CONFIG_SCHEMA_VERSION};

use mcp_router_common::ConfigError;
use std::path::Path;

/// Load config from `path`, or from the platform default when `None`.
///
/// A missing file is created from the commented template. The returned
/// config is validated strictly.
pub fn load_config(path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_or_create(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &RouterConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
