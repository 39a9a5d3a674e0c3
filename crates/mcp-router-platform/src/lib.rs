//! Platform layer for MCP Router.
//!
//! `PlatformApi` groups the domain capabilities a host works against. The
//! local implementation reads the bound workspace database and runs MCP
//! servers through `ServerSupervisor`; the remote implementation forwards
//! servers and logs to a remote workspace over tRPC.

pub mod api;
pub mod auth;
pub mod error;
pub mod executor;
pub mod local;
pub mod remote;
pub mod supervisor;

pub use api::{
    AgentApi, LogApi, PlatformApi, PlatformResult, ServerApi, SettingsApi, WorkspaceApi,
};
pub use auth::{AuthProvider, AuthState, AuthStatus, AuthStore, Credentials, SettingsAuthProvider, UserInfo};
pub use error::PlatformError;
pub use executor::McpToolExecutor;
pub use local::{LocalPlatform, WorkspaceManager};
pub use remote::RemotePlatform;
pub use supervisor::{McpClient, ServerSupervisor};
