use mcp_router_common::{new_id, now_millis, McpServerConfig, McpServerPatch};
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::StoreError;

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS servers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            config TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Registered MCP servers; the launch config is stored as JSON.
#[derive(Debug, Clone)]
pub struct ServerRepository {
    db: Database,
}

impl ServerRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn add_server(&self, mut config: McpServerConfig) -> Result<McpServerConfig, StoreError> {
        if config.id.is_empty() {
            config.id = new_id();
        }
        let json = serde_json::to_string(&config)?;
        let now = now_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO servers (id, name, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![config.id, config.name, json, now],
            )?;
            Ok(())
        })?;
        Ok(config)
    }

    pub fn all_servers(&self) -> Result<Vec<McpServerConfig>, StoreError> {
        let rows: Vec<String> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT config FROM servers ORDER BY created_at ASC")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    pub fn get_server(&self, id: &str) -> Result<Option<McpServerConfig>, StoreError> {
        let json: Option<String> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT config FROM servers WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    pub fn update_server(
        &self,
        id: &str,
        patch: McpServerPatch,
    ) -> Result<McpServerConfig, StoreError> {
        let mut config = self.get_server(id)?.ok_or_else(|| StoreError::NotFound {
            entity: "server",
            id: id.to_string(),
        })?;
        patch.apply(&mut config);
        let json = serde_json::to_string(&config)?;
        let now = now_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE servers SET name = ?1, config = ?2, updated_at = ?3 WHERE id = ?4",
                params![config.name, json, now, id],
            )?;
            Ok(())
        })?;
        Ok(config)
    }

    pub fn delete_server(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM servers WHERE id = ?1", params![id])?)
        })?;
        Ok(changed > 0)
    }
}
