//! The store context owned by the composition root.
//!
//! Repositories are built against whichever workspace database is bound.
//! Switching workspaces rebinds the context; handles obtained before the
//! switch keep pointing at the old database.

use std::sync::RwLock;
use tracing::info;

use crate::database::Database;
use crate::error::StoreError;
use crate::repositories::{
    AgentRepository, RequestLogRepository, ServerRepository, SessionRepository,
    SettingsRepository,
};

#[derive(Default)]
pub struct StoreContext {
    bound: RwLock<Option<Database>>,
}

impl StoreContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound_to(db: Database) -> Self {
        Self {
            bound: RwLock::new(Some(db)),
        }
    }

    /// Binds `db` if nothing is bound yet. Returns false otherwise.
    pub fn bind(&self, db: Database) -> Result<bool, StoreError> {
        let mut bound = self.bound.write().map_err(|_| StoreError::Poisoned)?;
        if bound.is_some() {
            return Ok(false);
        }
        info!(path = ?db.path(), "store context bound");
        *bound = Some(db);
        Ok(true)
    }

    /// Replaces the bound database.
    pub fn rebind(&self, db: Database) -> Result<(), StoreError> {
        let mut bound = self.bound.write().map_err(|_| StoreError::Poisoned)?;
        if bound.as_ref().is_some_and(|current| current.same_as(&db)) {
            return Ok(());
        }
        info!(path = ?db.path(), "store context rebound");
        *bound = Some(db);
        Ok(())
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        let mut bound = self.bound.write().map_err(|_| StoreError::Poisoned)?;
        *bound = None;
        info!("store context reset");
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.read().map(|b| b.is_some()).unwrap_or(false)
    }

    pub fn database(&self) -> Result<Database, StoreError> {
        let bound = self.bound.read().map_err(|_| StoreError::Poisoned)?;
        bound.clone().ok_or(StoreError::Unbound)
    }

    pub fn sessions(&self) -> Result<SessionRepository, StoreError> {
        self.database().map(SessionRepository::new)
    }

    pub fn agents(&self) -> Result<AgentRepository, StoreError> {
        self.database().map(AgentRepository::new)
    }

    pub fn servers(&self) -> Result<ServerRepository, StoreError> {
        self.database().map(ServerRepository::new)
    }

    pub fn request_logs(&self) -> Result<RequestLogRepository, StoreError> {
        self.database().map(RequestLogRepository::new)
    }

    pub fn settings(&self) -> Result<SettingsRepository, StoreError> {
        self.database().map(SettingsRepository::new)
    }
}
