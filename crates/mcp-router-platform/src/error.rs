use mcp_router_common::{ConfigError, RouterError};
use mcp_router_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("User authentication token is required for remote workspaces")]
    MissingToken,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("failed to spawn {server}: {message}")]
    Spawn { server: String, message: String },

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("auth error: {0}")]
    Auth(String),
}

impl PlatformError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<PlatformError> for RouterError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Store(e) => e.into(),
            PlatformError::Config(e) => RouterError::Config(e),
            PlatformError::Http { .. } | PlatformError::Network(_) | PlatformError::MissingToken => {
                RouterError::Remote(err.to_string())
            }
            PlatformError::Spawn { .. } | PlatformError::Mcp(_) => RouterError::Tool(err.to_string()),
            other => RouterError::Other(other.to_string()),
        }
    }
}
