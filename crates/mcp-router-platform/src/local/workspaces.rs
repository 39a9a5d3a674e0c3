//! Workspace registry and store binding.
//!
//! Workspaces are rows in the main database. The active one decides which
//! database the shared `StoreContext` is bound to: a local workspace names
//! its file (an empty path means the main database), a remote workspace
//! keeps its local-side data in a per-workspace file under the data dir.

use async_trait::async_trait;
use mcp_router_common::{Event, EventBus, Workspace, WorkspaceType};
use mcp_router_config::paths;
use mcp_router_store::{Database, StoreContext, WorkspaceRepository};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{PlatformResult, WorkspaceApi};
use crate::error::PlatformError;

pub const DEFAULT_WORKSPACE_NAME: &str = "Local";

pub struct WorkspaceManager {
    repo: WorkspaceRepository,
    main: Database,
    ctx: Arc<StoreContext>,
    bus: Arc<EventBus>,
    busy_timeout: Duration,
    workspace_root: Option<PathBuf>,
    opened: Mutex<HashMap<PathBuf, Database>>,
}

impl WorkspaceManager {
    pub fn new(
        main: Database,
        ctx: Arc<StoreContext>,
        bus: Arc<EventBus>,
        busy_timeout: Duration,
    ) -> Self {
        Self {
            repo: WorkspaceRepository::new(main.clone()),
            main,
            ctx,
            bus,
            busy_timeout,
            workspace_root: None,
            opened: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding per-workspace databases of remote workspaces.
    /// Defaults to `<data_dir>/workspaces`.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn context(&self) -> &Arc<StoreContext> {
        &self.ctx
    }

    /// Returns the active workspace, creating the default local workspace on
    /// first run and activating the most recently used one when none is.
    pub fn ensure_default(&self) -> PlatformResult<Workspace> {
        if let Some(active) = self.repo.active_workspace()? {
            return Ok(active);
        }
        let id = match self.repo.all()?.into_iter().next() {
            Some(ws) => ws.id,
            None => {
                let path = self
                    .main
                    .path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let ws = Workspace::local(DEFAULT_WORKSPACE_NAME, path);
                self.repo.create(&ws)?;
                info!(workspace_id = %ws.id, "created default workspace");
                ws.id
            }
        };
        self.repo.set_active_workspace(&id)?;
        self.repo
            .get(&id)?
            .ok_or_else(|| PlatformError::not_found("workspace", &id))
    }

    /// Binds the store context to the active workspace's database.
    pub fn bind_active(&self) -> PlatformResult<Workspace> {
        let ws = self.ensure_default()?;
        let db = self.database_for(&ws)?;
        self.ctx.rebind(db)?;
        Ok(ws)
    }

    pub fn database_for(&self, ws: &Workspace) -> PlatformResult<Database> {
        match ws.workspace_type {
            WorkspaceType::Local => {
                let path = ws
                    .local_config
                    .as_ref()
                    .map(|c| c.database_path.trim())
                    .unwrap_or_default();
                if path.is_empty() || self.main.path() == Some(Path::new(path)) {
                    return Ok(self.main.clone());
                }
                self.open(PathBuf::from(path))
            }
            WorkspaceType::Remote => {
                let path = match &self.workspace_root {
                    Some(root) => root.join(&ws.id).join(paths::MAIN_DATABASE_FILE),
                    None => paths::workspace_database_path(&ws.id)?,
                };
                self.open(path)
            }
        }
    }

    /// Opens `path` once; later calls reuse the same connection so rebinding
    /// to an already bound workspace is a no-op.
    fn open(&self, path: PathBuf) -> PlatformResult<Database> {
        let mut opened = self
            .opened
            .lock()
            .map_err(|_| PlatformError::InvalidState("workspace cache poisoned".into()))?;
        if let Some(db) = opened.get(&path) {
            return Ok(db.clone());
        }
        let db = Database::open(&path, self.busy_timeout)?;
        debug!(path = %path.display(), "opened workspace database");
        opened.insert(path, db.clone());
        Ok(db)
    }

    fn validate(ws: &Workspace) -> PlatformResult<()> {
        if ws.name.trim().is_empty() {
            return Err(PlatformError::InvalidState("workspace name is empty".into()));
        }
        match ws.workspace_type {
            WorkspaceType::Local if ws.local_config.is_none() => Err(PlatformError::InvalidState(
                "local workspace needs a database path".into(),
            )),
            WorkspaceType::Remote
                if ws
                    .remote_config
                    .as_ref()
                    .is_none_or(|c| c.api_url.trim().is_empty()) =>
            {
                Err(PlatformError::InvalidState(
                    "remote workspace needs an API URL".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl WorkspaceApi for WorkspaceManager {
    async fn list(&self) -> PlatformResult<Vec<Workspace>> {
        Ok(self.repo.all()?)
    }

    async fn create(&self, mut workspace: Workspace) -> PlatformResult<Workspace> {
        Self::validate(&workspace)?;
        workspace.is_active = false;
        self.repo.create(&workspace)?;
        info!(workspace_id = %workspace.id, kind = %workspace.workspace_type, "workspace created");
        Ok(workspace)
    }

    async fn active(&self) -> PlatformResult<Option<Workspace>> {
        Ok(self.repo.active_workspace()?)
    }

    async fn switch(&self, id: &str) -> PlatformResult<Workspace> {
        let ws = self
            .repo
            .get(id)?
            .ok_or_else(|| PlatformError::not_found("workspace", id))?;
        let db = self.database_for(&ws)?;
        self.repo.set_active_workspace(id)?;
        self.ctx.rebind(db)?;
        self.bus.publish(Event::WorkspaceSwitched(id.to_string()));
        info!(workspace_id = id, name = %ws.name, "switched workspace");
        self.repo
            .get(id)?
            .ok_or_else(|| PlatformError::not_found("workspace", id))
    }

    async fn delete(&self, id: &str) -> PlatformResult<bool> {
        if self
            .repo
            .active_workspace()?
            .is_some_and(|active| active.id == id)
        {
            return Err(PlatformError::InvalidState(
                "cannot delete the active workspace".into(),
            ));
        }
        Ok(self.repo.delete(id)?)
    }
}
