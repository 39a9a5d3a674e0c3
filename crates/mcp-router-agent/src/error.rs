use mcp_router_common::{RouterError, SessionKey};
use mcp_router_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Aborted")]
    Aborted,
    #[error("unknown tool call: {0}")]
    UnknownToolCall(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool {tool} is not permitted for agent {agent_id}")]
    NotPermitted { tool: String, agent_id: String },
    #[error("tool transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("session {0} is busy with another query")]
    SessionBusy(SessionKey),
}

impl From<EngineError> for RouterError {
    fn from(err: EngineError) -> Self {
        RouterError::Engine(err.to_string())
    }
}

impl From<ToolError> for RouterError {
    fn from(err: ToolError) -> Self {
        RouterError::Tool(err.to_string())
    }
}

impl From<CoordinatorError> for RouterError {
    fn from(err: CoordinatorError) -> Self {
        RouterError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        assert_eq!(EngineError::RateLimited.to_string(), "Rate limited");
        assert_eq!(
            EngineError::ApiError("HTTP 500: boom".into()).to_string(),
            "API error: HTTP 500: boom"
        );
    }

    #[test]
    fn persistence_error_wraps_store() {
        let err: PersistenceError = StoreError::Poisoned.into();
        assert_eq!(err.to_string(), "database lock poisoned");
    }

    #[test]
    fn coordinator_error_display() {
        let err = CoordinatorError::SessionBusy(SessionKey::from("bg-1"));
        assert_eq!(err.to_string(), "session bg-1 is busy with another query");
        let router: RouterError = err.into();
        assert!(matches!(router, RouterError::Other(_)));
    }
}
