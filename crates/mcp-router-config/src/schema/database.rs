//! Storage configuration.

use serde::{Deserialize, Serialize};

/// SQLite settings for the workspace databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Override for the main database file. Empty means
    /// `<data_dir>/mcprouter.db`.
    pub path: Option<String>,
    /// SQLite busy timeout in milliseconds (valid range: 0-60000).
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}
