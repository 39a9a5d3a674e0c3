use mcp_router_common::RouterError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("invalid value in column {column}: {value}")]
    InvalidColumn { column: &'static str, value: String },

    #[error("database lock poisoned")]
    Poisoned,

    #[error("no database bound to the store context")]
    Unbound,
}

impl From<StoreError> for RouterError {
    fn from(err: StoreError) -> Self {
        RouterError::Store(err.to_string())
    }
}
