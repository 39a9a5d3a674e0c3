//! Platform data locations.

use mcp_router_common::ConfigError;
use std::path::PathBuf;

use crate::schema::RouterConfig;

pub(crate) const APP_DIR_NAME: &str = "mcp-router";

/// File name of the main database, which also holds the workspace table.
pub const MAIN_DATABASE_FILE: &str = "mcprouter.db";

/// `<data_dir>/mcp-router`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine data directory".into()))?;
    Ok(base.join(APP_DIR_NAME))
}

/// Main database path, honouring `[database] path`.
pub fn main_database_path(config: &RouterConfig) -> Result<PathBuf, ConfigError> {
    match &config.database.path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(data_dir()?.join(MAIN_DATABASE_FILE)),
    }
}

/// Database file for a local workspace other than the default one.
pub fn workspace_database_path(workspace_id: &str) -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?
        .join("workspaces")
        .join(workspace_id)
        .join(MAIN_DATABASE_FILE))
}
