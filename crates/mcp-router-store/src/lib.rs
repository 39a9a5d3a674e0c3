//! SQLite persistence for MCP Router.
//!
//! One `Database` per workspace plus the main database holding the
//! workspace table. Repositories are cheap handles over a shared
//! connection; `StoreContext` decides which database they talk to.

pub mod context;
pub mod database;
pub mod error;
mod pagination;
pub mod repositories;

pub use context::StoreContext;
pub use database::Database;
pub use error::StoreError;
pub use repositories::{
    AgentRepository, RequestLogRepository, ServerRepository, SessionRepository,
    SettingsRepository, WorkspaceRepository,
};
