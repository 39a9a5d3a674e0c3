use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("remote api error: {0}")]
    Remote(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("{0}")]
    Other(String),
}
