use mcp_router_common::{new_id, now_millis, AgentConfig, AgentPatch};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::database::Database;
use crate::error::StoreError;

const COLUMNS: &str = "id, name, purpose, description, instructions, mcp_servers, \
                       tool_permissions, auto_execute_tool, server_agent_id, created_at, updated_at";

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            purpose TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            instructions TEXT NOT NULL DEFAULT '',
            mcp_servers TEXT NOT NULL DEFAULT '[]',
            tool_permissions TEXT NOT NULL DEFAULT '{}',
            auto_execute_tool INTEGER NOT NULL DEFAULT 0,
            server_agent_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_agents_name ON agents(name);
        "#,
    )?;
    Ok(())
}

struct AgentRow {
    id: String,
    name: String,
    purpose: String,
    description: String,
    instructions: String,
    mcp_servers: String,
    tool_permissions: String,
    auto_execute_tool: bool,
    server_agent_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        purpose: row.get(2)?,
        description: row.get(3)?,
        instructions: row.get(4)?,
        mcp_servers: row.get(5)?,
        tool_permissions: row.get(6)?,
        auto_execute_tool: row.get(7)?,
        server_agent_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn into_agent(row: AgentRow) -> Result<AgentConfig, StoreError> {
    Ok(AgentConfig {
        id: row.id,
        name: row.name,
        purpose: row.purpose,
        description: row.description,
        instructions: row.instructions,
        mcp_servers: serde_json::from_str(&row.mcp_servers)?,
        tool_permissions: serde_json::from_str(&row.tool_permissions)?,
        auto_execute_tool: row.auto_execute_tool,
        server_agent_id: row.server_agent_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[derive(Debug, Clone)]
pub struct AgentRepository {
    db: Database,
}

impl AgentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts `agent`, assigning an id when it has none.
    pub fn add_agent(&self, mut agent: AgentConfig) -> Result<AgentConfig, StoreError> {
        if agent.id.is_empty() {
            agent.id = new_id();
        }
        let now = now_millis();
        if agent.created_at == 0 {
            agent.created_at = now;
        }
        agent.updated_at = now;
        self.write(&agent, false)?;
        debug!(agent_id = %agent.id, name = %agent.name, "agent added");
        Ok(agent)
    }

    pub fn all_agents(&self) -> Result<Vec<AgentConfig>, StoreError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM agents ORDER BY created_at ASC"))?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(into_agent).collect()
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<AgentConfig>, StoreError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM agents WHERE id = ?1"),
                    params![id],
                    read_row,
                )
                .optional()?)
        })?;
        row.map(into_agent).transpose()
    }

    /// Applies `patch`, keeping `created_at`. `None` when the agent does not
    /// exist.
    pub fn update_agent(
        &self,
        id: &str,
        patch: AgentPatch,
    ) -> Result<Option<AgentConfig>, StoreError> {
        let Some(mut agent) = self.get_agent(id)? else {
            return Ok(None);
        };
        patch.apply(&mut agent);
        agent.updated_at = now_millis().max(agent.updated_at + 1);
        self.write(&agent, true)?;
        Ok(Some(agent))
    }

    pub fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM agents WHERE id = ?1", params![id])?)
        })?;
        Ok(changed > 0)
    }

    fn write(&self, agent: &AgentConfig, replace: bool) -> Result<(), StoreError> {
        let mcp_servers = serde_json::to_string(&agent.mcp_servers)?;
        let tool_permissions = serde_json::to_string(&agent.tool_permissions)?;
        let verb = if replace { "REPLACE" } else { "INSERT" };
        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "{verb} INTO agents ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    agent.id,
                    agent.name,
                    agent.purpose,
                    agent.description,
                    agent.instructions,
                    mcp_servers,
                    tool_permissions,
                    agent.auto_execute_tool,
                    agent.server_agent_id,
                    agent.created_at,
                    agent.updated_at,
                ],
            )?;
            Ok(())
        })
    }
}
