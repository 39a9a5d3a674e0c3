//! Domain capabilities the host works against.
//!
//! `LocalPlatform` serves every domain from the bound workspace database.
//! `RemotePlatform` serves servers and logs from a remote workspace and
//! hands the rest to a local platform.

use async_trait::async_trait;
use mcp_router_common::{
    AgentConfig, AgentPatch, AppSettings, McpServer, McpServerConfig, McpServerPatch,
    RequestLogFilters, RequestLogPage, ServerStatus, Workspace,
};

use crate::error::PlatformError;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn list(&self) -> PlatformResult<Vec<McpServer>>;
    async fn get(&self, id: &str) -> PlatformResult<Option<McpServer>>;
    async fn create(&self, config: McpServerConfig) -> PlatformResult<McpServer>;
    async fn update(&self, id: &str, patch: McpServerPatch) -> PlatformResult<McpServer>;
    async fn delete(&self, id: &str) -> PlatformResult<()>;
    async fn start(&self, id: &str) -> PlatformResult<bool>;
    async fn stop(&self, id: &str) -> PlatformResult<bool>;
    async fn status(&self, id: &str) -> PlatformResult<ServerStatus>;
}

#[async_trait]
pub trait LogApi: Send + Sync {
    async fn query(
        &self,
        filters: &RequestLogFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> PlatformResult<RequestLogPage>;
}

#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn list(&self) -> PlatformResult<Vec<AgentConfig>>;
    async fn get(&self, id: &str) -> PlatformResult<Option<AgentConfig>>;
    async fn create(&self, agent: AgentConfig) -> PlatformResult<AgentConfig>;
    async fn update(&self, id: &str, patch: AgentPatch) -> PlatformResult<Option<AgentConfig>>;
    async fn delete(&self, id: &str) -> PlatformResult<bool>;
}

#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn get(&self) -> PlatformResult<AppSettings>;
    async fn save(&self, settings: &AppSettings) -> PlatformResult<()>;
    async fn increment_overlay_count(&self) -> PlatformResult<u32>;
}

#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    async fn list(&self) -> PlatformResult<Vec<Workspace>>;
    async fn create(&self, workspace: Workspace) -> PlatformResult<Workspace>;
    async fn active(&self) -> PlatformResult<Option<Workspace>>;
    /// Activates `id` and rebinds the store context to its database.
    async fn switch(&self, id: &str) -> PlatformResult<Workspace>;
    async fn delete(&self, id: &str) -> PlatformResult<bool>;
}

pub trait PlatformApi: Send + Sync {
    fn servers(&self) -> &dyn ServerApi;
    fn logs(&self) -> &dyn LogApi;
    fn agents(&self) -> &dyn AgentApi;
    fn settings(&self) -> &dyn SettingsApi;
    fn workspaces(&self) -> &dyn WorkspaceApi;
}
