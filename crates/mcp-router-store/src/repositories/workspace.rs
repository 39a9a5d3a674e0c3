//! Workspaces live in the main database and pick which database the other
//! repositories are bound to.

use chrono::{DateTime, Utc};
use mcp_router_common::{Workspace, WorkspaceType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::database::Database;
use crate::error::StoreError;

const COLUMNS: &str =
    "id, name, type, isActive, createdAt, lastUsedAt, localConfig, remoteConfig";

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS workspaces (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK(type IN ('local', 'remote')),
            isActive INTEGER NOT NULL DEFAULT 0,
            createdAt TEXT NOT NULL,
            lastUsedAt TEXT NOT NULL,
            localConfig TEXT,
            remoteConfig TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_workspaces_active ON workspaces(isActive);
        CREATE INDEX IF NOT EXISTS idx_workspaces_type ON workspaces(type);
        CREATE INDEX IF NOT EXISTS idx_workspaces_last_used ON workspaces(lastUsedAt);
        "#,
    )?;
    Ok(())
}

struct WorkspaceRow {
    id: String,
    name: String,
    kind: String,
    is_active: bool,
    created_at: String,
    last_used_at: String,
    local_config: Option<String>,
    remote_config: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        last_used_at: row.get(5)?,
        local_config: row.get(6)?,
        remote_config: row.get(7)?,
    })
}

fn parse_time(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidColumn {
            column,
            value: value.to_string(),
        })
}

fn into_workspace(row: WorkspaceRow) -> Result<Workspace, StoreError> {
    let workspace_type =
        row.kind
            .parse::<WorkspaceType>()
            .map_err(|_| StoreError::InvalidColumn {
                column: "type",
                value: row.kind.clone(),
            })?;
    Ok(Workspace {
        id: row.id,
        name: row.name,
        workspace_type,
        is_active: row.is_active,
        created_at: parse_time("createdAt", &row.created_at)?,
        last_used_at: parse_time("lastUsedAt", &row.last_used_at)?,
        local_config: row
            .local_config
            .map(|c| serde_json::from_str(&c))
            .transpose()?,
        remote_config: row
            .remote_config
            .map(|c| serde_json::from_str(&c))
            .transpose()?,
    })
}

#[derive(Debug, Clone)]
pub struct WorkspaceRepository {
    db: Database,
}

impl WorkspaceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, workspace: &Workspace) -> Result<(), StoreError> {
        let local = workspace
            .local_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let remote = workspace
            .remote_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.db.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO workspaces ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    workspace.id,
                    workspace.name,
                    workspace.workspace_type.as_str(),
                    workspace.is_active,
                    workspace.created_at.to_rfc3339(),
                    workspace.last_used_at.to_rfc3339(),
                    local,
                    remote,
                ],
            )?;
            Ok(())
        })
    }

    pub fn all(&self) -> Result<Vec<Workspace>, StoreError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM workspaces ORDER BY lastUsedAt DESC"
            ))?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(into_workspace).collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<Workspace>, StoreError> {
        self.find_one("id = ?1", id)
    }

    pub fn active_workspace(&self) -> Result<Option<Workspace>, StoreError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM workspaces WHERE isActive = 1 LIMIT 1"),
                    [],
                    read_row,
                )
                .optional()?)
        })?;
        row.map(into_workspace).transpose()
    }

    /// Deactivates every workspace and activates `id` in one transaction.
    pub fn set_active_workspace(&self, id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("UPDATE workspaces SET isActive = 0", [])?;
            let changed = tx.execute(
                "UPDATE workspaces SET isActive = 1, lastUsedAt = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "workspace",
                    id: id.to_string(),
                });
            }
            tx.commit()?;
            Ok(())
        })?;
        info!(workspace_id = id, "active workspace changed");
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id])?)
        })?;
        Ok(changed > 0)
    }

    fn find_one(&self, clause: &str, arg: &str) -> Result<Option<Workspace>, StoreError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM workspaces WHERE {clause}"),
                    params![arg],
                    read_row,
                )
                .optional()?)
        })?;
        row.map(into_workspace).transpose()
    }
}
