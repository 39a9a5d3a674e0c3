//! Composition root.
//!
//! Opens the main database, binds the store context to the active
//! workspace, and wires the coordinator to the HTTP engine, the event bus,
//! the session store and the MCP tool executor.

use mcp_router_agent::{
    BusTransport, CoordinatorSettings, HttpEngine, HttpEngineConfig, PersistenceSink,
    SessionCoordinator,
};
use mcp_router_common::{Event, EventBus, RouterError, Workspace, WorkspaceType};
use mcp_router_config::{paths, RouterConfig};
use mcp_router_platform::{
    AuthStore, LocalPlatform, McpToolExecutor, PlatformApi, PlatformError, RemotePlatform,
    ServerSupervisor, SettingsAuthProvider, WorkspaceManager,
};
use mcp_router_store::{Database, StoreContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn secs(value: u32) -> Duration {
    Duration::from_secs(u64::from(value))
}

pub struct Runtime {
    pub config: RouterConfig,
    pub bus: Arc<EventBus>,
    pub ctx: Arc<StoreContext>,
    pub supervisor: Arc<ServerSupervisor>,
    pub local: Arc<LocalPlatform>,
    pub auth: AuthStore,
    pub workspace: Workspace,
}

impl Runtime {
    pub async fn boot(config: RouterConfig) -> Result<Self, RouterError> {
        let busy_timeout = Duration::from_millis(u64::from(config.database.busy_timeout_ms));
        let main_path = paths::main_database_path(&config)?;
        let main = Database::open(&main_path, busy_timeout)?;

        let ctx = Arc::new(StoreContext::new());
        let bus = Arc::new(EventBus::default());
        let workspaces = Arc::new(WorkspaceManager::new(
            main,
            ctx.clone(),
            bus.clone(),
            busy_timeout,
        ));
        let workspace = workspaces.bind_active()?;
        info!(workspace_id = %workspace.id, name = %workspace.name, kind = %workspace.workspace_type, "workspace bound");

        let supervisor = Arc::new(ServerSupervisor::default());
        let local = Arc::new(LocalPlatform::new(supervisor.clone(), workspaces));
        let auth = AuthStore::new(Arc::new(SettingsAuthProvider::new(ctx.clone())));

        let runtime = Self {
            config,
            bus,
            ctx,
            supervisor,
            local,
            auth,
            workspace,
        };
        runtime.load_auth().await?;

        if runtime.config.sessions.cleanup_on_startup {
            let removed = runtime.cleanup(runtime.config.sessions.max_sessions_per_agent)?;
            info!(removed, "startup session cleanup");
        }
        Ok(runtime)
    }

    async fn load_auth(&self) -> Result<(), RouterError> {
        let settings = self.local.settings().get().await?;
        self.auth.initialize_from_settings(&settings);
        Ok(())
    }

    /// Platform for the active workspace. Remote workspaces need a stored
    /// user token.
    pub fn platform(&self) -> Result<Arc<dyn PlatformApi>, RouterError> {
        match self.workspace.workspace_type {
            WorkspaceType::Local => Ok(self.local.clone()),
            WorkspaceType::Remote => {
                let api_url = self
                    .workspace
                    .remote_config
                    .as_ref()
                    .map(|c| c.api_url.as_str())
                    .ok_or_else(|| {
                        PlatformError::InvalidState("remote workspace has no API URL".into())
                    })?;
                let remote = RemotePlatform::new(
                    api_url,
                    self.auth.auth_token(),
                    secs(self.config.remote.request_timeout_secs),
                    self.local.clone(),
                )?;
                Ok(Arc::new(remote))
            }
        }
    }

    pub fn coordinator(&self) -> Result<SessionCoordinator, RouterError> {
        let engine = HttpEngine::new(HttpEngineConfig {
            api_url: self.config.engine.api_url.clone(),
            connect_timeout: secs(self.config.engine.connect_timeout_secs),
            max_steps: self.config.engine.max_steps,
        })?;
        let persistence: Arc<dyn PersistenceSink> = self.ctx.clone();
        let tools = McpToolExecutor::new(self.ctx.clone(), self.supervisor.clone());
        let bus = self.bus.clone();

        Ok(SessionCoordinator::new(
            Arc::new(engine),
            Arc::new(BusTransport::new(self.bus.clone())),
            persistence,
            Arc::new(tools),
        )
        .with_settings(CoordinatorSettings {
            response_timeout: secs(self.config.engine.response_timeout_secs),
            tool_timeout: secs(self.config.tools.execution_timeout_secs),
        })
        .with_completion_hook(move |key| {
            bus.publish(Event::SessionCompleted(key.clone()));
        }))
    }

    /// Activates `id`, rebinds the store and reloads the auth state from the
    /// new workspace's settings.
    pub async fn switch_workspace(&mut self, id: &str) -> Result<&Workspace, RouterError> {
        self.supervisor.stop_all().await;
        self.workspace = self.local.workspaces().switch(id).await?;
        self.load_auth().await?;
        Ok(&self.workspace)
    }

    pub fn cleanup(&self, max_per_agent: u32) -> Result<usize, RouterError> {
        Ok(self.ctx.sessions()?.cleanup_old_sessions(max_per_agent)?)
    }

    pub async fn shutdown(&self) {
        self.supervisor.stop_all().await;
        self.bus.publish(Event::Shutdown);
    }
}
