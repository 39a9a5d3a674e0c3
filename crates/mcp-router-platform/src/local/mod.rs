//! Platform backed by the bound workspace database.

pub mod workspaces;

use async_trait::async_trait;
use mcp_router_common::{
    AgentConfig, AgentPatch, AppSettings, McpServer, McpServerConfig, McpServerPatch,
    RequestLogFilters, RequestLogPage, ServerStatus,
};
use mcp_router_store::StoreContext;
use std::sync::Arc;
use tracing::{info, warn};

pub use workspaces::WorkspaceManager;

use crate::api::{
    AgentApi, LogApi, PlatformApi, PlatformResult, ServerApi, SettingsApi, WorkspaceApi,
};
use crate::error::PlatformError;
use crate::supervisor::ServerSupervisor;

pub struct LocalServers {
    ctx: Arc<StoreContext>,
    supervisor: Arc<ServerSupervisor>,
}

impl LocalServers {
    async fn with_status(&self, config: McpServerConfig) -> McpServer {
        let status = self.supervisor.status(&config.id).await;
        McpServer {
            config,
            status: status.state,
            error_message: status.error,
        }
    }

    fn config(&self, id: &str) -> PlatformResult<McpServerConfig> {
        self.ctx
            .servers()?
            .get_server(id)?
            .ok_or_else(|| PlatformError::not_found("server", id))
    }
}

#[async_trait]
impl ServerApi for LocalServers {
    async fn list(&self) -> PlatformResult<Vec<McpServer>> {
        let configs = self.ctx.servers()?.all_servers()?;
        let mut servers = Vec::with_capacity(configs.len());
        for config in configs {
            servers.push(self.with_status(config).await);
        }
        Ok(servers)
    }

    async fn get(&self, id: &str) -> PlatformResult<Option<McpServer>> {
        match self.ctx.servers()?.get_server(id)? {
            Some(config) => Ok(Some(self.with_status(config).await)),
            None => Ok(None),
        }
    }

    async fn create(&self, config: McpServerConfig) -> PlatformResult<McpServer> {
        let config = self.ctx.servers()?.add_server(config)?;
        info!(server_id = %config.id, name = %config.name, "server added");
        Ok(self.with_status(config).await)
    }

    async fn update(&self, id: &str, patch: McpServerPatch) -> PlatformResult<McpServer> {
        self.config(id)?;
        let config = self.ctx.servers()?.update_server(id, patch)?;
        Ok(self.with_status(config).await)
    }

    async fn delete(&self, id: &str) -> PlatformResult<()> {
        self.supervisor.stop(id).await?;
        if !self.ctx.servers()?.delete_server(id)? {
            return Err(PlatformError::not_found("server", id));
        }
        info!(server_id = id, "server removed");
        Ok(())
    }

    async fn start(&self, id: &str) -> PlatformResult<bool> {
        let config = self.config(id)?;
        self.supervisor.start(&config).await
    }

    async fn stop(&self, id: &str) -> PlatformResult<bool> {
        self.supervisor.stop(id).await
    }

    async fn status(&self, id: &str) -> PlatformResult<ServerStatus> {
        self.config(id)?;
        Ok(self.supervisor.status(id).await)
    }
}

pub struct LocalLogs {
    ctx: Arc<StoreContext>,
}

#[async_trait]
impl LogApi for LocalLogs {
    async fn query(
        &self,
        filters: &RequestLogFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> PlatformResult<RequestLogPage> {
        Ok(self.ctx.request_logs()?.query(filters, cursor, limit)?)
    }
}

pub struct LocalAgents {
    ctx: Arc<StoreContext>,
}

#[async_trait]
impl AgentApi for LocalAgents {
    async fn list(&self) -> PlatformResult<Vec<AgentConfig>> {
        Ok(self.ctx.agents()?.all_agents()?)
    }

    async fn get(&self, id: &str) -> PlatformResult<Option<AgentConfig>> {
        Ok(self.ctx.agents()?.get_agent(id)?)
    }

    async fn create(&self, agent: AgentConfig) -> PlatformResult<AgentConfig> {
        Ok(self.ctx.agents()?.add_agent(agent)?)
    }

    async fn update(&self, id: &str, patch: AgentPatch) -> PlatformResult<Option<AgentConfig>> {
        Ok(self.ctx.agents()?.update_agent(id, patch)?)
    }

    async fn delete(&self, id: &str) -> PlatformResult<bool> {
        Ok(self.ctx.agents()?.delete_agent(id)?)
    }
}

pub struct LocalSettings {
    ctx: Arc<StoreContext>,
}

#[async_trait]
impl SettingsApi for LocalSettings {
    async fn get(&self) -> PlatformResult<AppSettings> {
        Ok(self.ctx.settings()?.get()?)
    }

    async fn save(&self, settings: &AppSettings) -> PlatformResult<()> {
        Ok(self.ctx.settings()?.save(settings)?)
    }

    async fn increment_overlay_count(&self) -> PlatformResult<u32> {
        Ok(self.ctx.settings()?.increment_overlay_count()?)
    }
}

pub struct LocalPlatform {
    servers: LocalServers,
    logs: LocalLogs,
    agents: LocalAgents,
    settings: LocalSettings,
    workspaces: Arc<WorkspaceManager>,
}

impl LocalPlatform {
    pub fn new(supervisor: Arc<ServerSupervisor>, workspaces: Arc<WorkspaceManager>) -> Self {
        let ctx = workspaces.context().clone();
        Self {
            servers: LocalServers {
                ctx: ctx.clone(),
                supervisor,
            },
            logs: LocalLogs { ctx: ctx.clone() },
            agents: LocalAgents { ctx: ctx.clone() },
            settings: LocalSettings { ctx },
            workspaces,
        }
    }

    /// Starts every enabled stdio server flagged `auto_start`. Failures are
    /// logged and skipped. Returns how many servers came up.
    pub async fn start_auto_servers(&self) -> PlatformResult<usize> {
        let configs = self.servers.ctx.servers()?.all_servers()?;
        let mut started = 0;
        for config in configs.iter().filter(|c| c.auto_start && !c.disabled) {
            match self.servers.supervisor.start(config).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!(server_id = %config.id, error = %e, "auto start failed"),
            }
        }
        Ok(started)
    }
}

impl PlatformApi for LocalPlatform {
    fn servers(&self) -> &dyn ServerApi {
        &self.servers
    }

    fn logs(&self) -> &dyn LogApi {
        &self.logs
    }

    fn agents(&self) -> &dyn AgentApi {
        &self.agents
    }

    fn settings(&self) -> &dyn SettingsApi {
        &self.settings
    }

    fn workspaces(&self) -> &dyn WorkspaceApi {
        self.workspaces.as_ref()
    }
}
