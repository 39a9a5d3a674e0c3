//! Chat session persistence.

use mcp_router_common::{
    new_id, now_millis, ChatMessage, CursorPage, PageOptions, Session, SessionStatus,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::StoreError;
use crate::pagination::{fetch_page, format_cursor, PageQuery};

const COLUMNS: &str = "id, agent_id, messages, created_at, updated_at, status, source";

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            messages TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            source TEXT NOT NULL DEFAULT 'ui'
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_agent_id ON chat_sessions(agent_id);
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_created_at ON chat_sessions(created_at);
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_status ON chat_sessions(status);
        "#,
    )?;
    Ok(())
}

struct SessionRow {
    id: String,
    agent_id: String,
    messages: String,
    created_at: i64,
    updated_at: i64,
    status: String,
    source: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        messages: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        status: row.get(5)?,
        source: row.get(6)?,
    })
}

fn into_session(row: SessionRow) -> Result<Session, StoreError> {
    let messages: Vec<ChatMessage> = if row.messages.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&row.messages)?
    };
    let status = row
        .status
        .parse::<SessionStatus>()
        .map_err(|_| StoreError::InvalidColumn {
            column: "status",
            value: row.status.clone(),
        })?;
    Ok(Session {
        id: row.id,
        agent_id: row.agent_id,
        messages,
        created_at: row.created_at,
        updated_at: row.updated_at,
        status,
        source: row.source,
    })
}

fn cursor_of(session: &Session, opts: &PageOptions) -> String {
    let ts = match opts.order_by {
        mcp_router_common::OrderBy::CreatedAt => session.created_at,
        mcp_router_common::OrderBy::UpdatedAt => session.updated_at,
    };
    format_cursor(ts, &session.id)
}

/// Sessions in the `chat_sessions` table.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: Database,
}

impl SessionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_session(
        &self,
        agent_id: &str,
        messages: Vec<ChatMessage>,
        source: &str,
        status: SessionStatus,
    ) -> Result<Session, StoreError> {
        let now = now_millis();
        let session = Session {
            id: new_id(),
            agent_id: agent_id.to_string(),
            messages,
            created_at: now,
            updated_at: now,
            status,
            source: source.to_string(),
        };
        let messages_json = serde_json::to_string(&session.messages)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, agent_id, messages, created_at, updated_at, status, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id,
                    session.agent_id,
                    messages_json,
                    session.created_at,
                    session.updated_at,
                    session.status.as_str(),
                    session.source,
                ],
            )?;
            Ok(())
        })?;

        debug!(session_id = %session.id, agent_id, "session created");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM chat_sessions WHERE id = ?1"),
                    params![id],
                    read_row,
                )
                .optional()?)
        })?;
        row.map(into_session).transpose()
    }

    /// Replaces the transcript and bumps `updated_at`. `None` when the
    /// session does not exist.
    pub fn update_session_messages(
        &self,
        id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<Option<Session>, StoreError> {
        let messages_json = serde_json::to_string(&messages)?;
        let now = now_millis();
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE chat_sessions SET messages = ?1, updated_at = ?2 WHERE id = ?3",
                params![messages_json, now, id],
            )?)
        })?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    pub fn add_message_to_session(
        &self,
        id: &str,
        message: ChatMessage,
    ) -> Result<Option<Session>, StoreError> {
        let Some(session) = self.get(id)? else {
            return Ok(None);
        };
        let mut messages = session.messages;
        messages.push(message);
        self.update_session_messages(id, messages)
    }

    pub fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<Option<Session>, StoreError> {
        let now = now_millis();
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE chat_sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, id],
            )?)
        })?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    pub fn sessions_by_agent(
        &self,
        agent_id: &str,
        opts: &PageOptions,
    ) -> Result<CursorPage<Session>, StoreError> {
        self.page(vec![("agent_id = ?", SqlValue::Text(agent_id.to_string()))], opts)
    }

    pub fn sessions_by_status(
        &self,
        status: SessionStatus,
        agent_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<CursorPage<Session>, StoreError> {
        let mut filter = vec![("status = ?", SqlValue::Text(status.as_str().to_string()))];
        if let Some(agent_id) = agent_id {
            filter.push(("agent_id = ?", SqlValue::Text(agent_id.to_string())));
        }
        self.page(filter, opts)
    }

    pub fn recent_sessions(
        &self,
        source: Option<&str>,
        opts: &PageOptions,
    ) -> Result<CursorPage<Session>, StoreError> {
        let filter = source
            .map(|s| vec![("source = ?", SqlValue::Text(s.to_string()))])
            .unwrap_or_default();
        self.page(filter, opts)
    }

    pub fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM chat_sessions WHERE id = ?1", params![id])?)
        })?;
        Ok(changed > 0)
    }

    pub fn delete_sessions_by_agent(&self, agent_id: &str) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM chat_sessions WHERE agent_id = ?1",
                params![agent_id],
            )?)
        })
    }

    pub fn session_count_by_agent(&self, agent_id: &str) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE agent_id = ?1",
                params![agent_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Keeps the `max_per_agent` most recently updated sessions of every
    /// agent. Returns the number of deleted rows.
    pub fn cleanup_old_sessions(&self, max_per_agent: u32) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let agent_ids: Vec<String> = {
                let mut stmt = tx.prepare("SELECT DISTINCT agent_id FROM chat_sessions")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                ids
            };

            let mut deleted = 0;
            for agent_id in &agent_ids {
                let removed = tx.execute(
                    "DELETE FROM chat_sessions WHERE id IN (
                        SELECT id FROM chat_sessions WHERE agent_id = ?1
                        ORDER BY updated_at DESC LIMIT -1 OFFSET ?2
                    )",
                    params![agent_id, max_per_agent],
                )?;
                if removed > 0 {
                    info!(agent_id = %agent_id, removed, "cleaned up old sessions");
                }
                deleted += removed;
            }
            tx.commit()?;
            Ok(deleted)
        })
    }

    fn page(
        &self,
        filter: Vec<(&str, SqlValue)>,
        opts: &PageOptions,
    ) -> Result<CursorPage<Session>, StoreError> {
        self.db.with_conn(|conn| {
            fetch_page(
                conn,
                PageQuery {
                    table: "chat_sessions",
                    columns: COLUMNS,
                    filter,
                },
                opts,
                read_row,
                into_session,
                |session| cursor_of(session, opts),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_router_common::{OrderBy, Role, SortOrder};

    fn repo() -> SessionRepository {
        SessionRepository::new(Database::open_in_memory().unwrap())
    }

    fn set_times(repo: &SessionRepository, id: &str, created: i64, updated: i64) {
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE chat_sessions SET created_at = ?1, updated_at = ?2 WHERE id = ?3",
                    params![created, updated, id],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn create_and_get_roundtrip() {
        let repo = repo();
        let messages = vec![
            ChatMessage::new(Role::User, "hello"),
            ChatMessage::new(Role::Assistant, "hi"),
        ];
        let created = repo
            .create_session("agent-1", messages.clone(), "ui", SessionStatus::Completed)
            .unwrap();

        let loaded = repo.get(&created.id).unwrap().unwrap();
        assert_eq!(loaded.agent_id, "agent-1");
        assert_eq!(loaded.messages, messages);
        assert_eq!(loaded.status, SessionStatus::Completed);
        assert_eq!(loaded.source, "ui");
    }

    #[test]
    fn get_missing_is_none() {
        assert!(repo().get("nope").unwrap().is_none());
    }

    #[test]
    fn update_messages_bumps_updated_at() {
        let repo = repo();
        let created = repo
            .create_session("a", vec![], "ui", SessionStatus::Pending)
            .unwrap();
        set_times(&repo, &created.id, 1, 1);

        let updated = repo
            .update_session_messages(&created.id, vec![ChatMessage::new(Role::User, "q")])
            .unwrap()
            .unwrap();
        assert_eq!(updated.messages.len(), 1);
        assert_eq!(updated.created_at, 1);
        assert!(updated.updated_at > 1);
    }

    #[test]
    fn update_missing_session_is_none() {
        let repo = repo();
        let result = repo.update_session_messages("missing", vec![]).unwrap();
        assert!(result.is_none());
        assert!(repo
            .update_session_status("missing", SessionStatus::Failed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn add_message_appends() {
        let repo = repo();
        let created = repo
            .create_session("a", vec![ChatMessage::new(Role::User, "one")], "ui", SessionStatus::Pending)
            .unwrap();
        let updated = repo
            .add_message_to_session(&created.id, ChatMessage::new(Role::Assistant, "two"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.messages.len(), 2);
        assert_eq!(updated.messages[1].content, "two");
    }

    #[test]
    fn pagination_by_agent() {
        let repo = repo();
        for i in 0..5 {
            let s = repo
                .create_session("agent", vec![], "ui", SessionStatus::Completed)
                .unwrap();
            set_times(&repo, &s.id, 100 + i, 100 + i);
        }
        repo.create_session("other", vec![], "ui", SessionStatus::Completed)
            .unwrap();

        let opts = PageOptions::default().with_limit(2);
        let first = repo.sessions_by_agent("agent", &opts).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.items[0].updated_at, 104);
        let cursor = first.next_cursor.clone().unwrap();
        assert_eq!(cursor, format!("103_{}", first.items[1].id));

        let second = repo
            .sessions_by_agent("agent", &opts.clone().with_cursor(cursor))
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[0].updated_at, 102);

        let last = repo
            .sessions_by_agent("agent", &opts.with_cursor(second.next_cursor.unwrap()))
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn pagination_ascending_by_created_at() {
        let repo = repo();
        for i in 0..3 {
            let s = repo
                .create_session("agent", vec![], "ui", SessionStatus::Completed)
                .unwrap();
            set_times(&repo, &s.id, 10 + i, 50 - i);
        }
        let opts = PageOptions::default()
            .with_limit(2)
            .with_order(OrderBy::CreatedAt, SortOrder::Asc);
        let page = repo.sessions_by_agent("agent", &opts).unwrap();
        assert_eq!(page.items[0].created_at, 10);
        assert_eq!(page.next_cursor, Some(format!("11_{}", page.items[1].id)));
    }

    #[test]
    fn sessions_sharing_a_millisecond_are_not_skipped() {
        let repo = repo();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let s = repo
                .create_session("agent", vec![], "ui", SessionStatus::Completed)
                .unwrap();
            set_times(&repo, &s.id, 500, 500);
            ids.push(s.id);
        }

        let opts = PageOptions::default().with_limit(2);
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page_opts = match cursor.take() {
                Some(c) => opts.clone().with_cursor(c),
                None => opts.clone(),
            };
            let page = repo.sessions_by_agent("agent", &page_opts).unwrap();
            seen.extend(page.items.iter().map(|s| s.id.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        ids.sort();
        ids.reverse();
        assert_eq!(seen, ids);
    }

    #[test]
    fn invalid_cursor_is_rejected() {
        let repo = repo();
        for bad in ["not-a-number", "103", "abc_s1"] {
            let opts = PageOptions::default().with_cursor(bad);
            let err = repo.sessions_by_agent("a", &opts).unwrap_err();
            assert!(matches!(err, StoreError::InvalidCursor(_)));
        }
    }

    #[test]
    fn filter_by_status_and_source() {
        let repo = repo();
        repo.create_session("a", vec![], "ui", SessionStatus::Completed)
            .unwrap();
        repo.create_session("a", vec![], "mcp", SessionStatus::Failed)
            .unwrap();
        repo.create_session("b", vec![], "mcp", SessionStatus::Completed)
            .unwrap();

        let opts = PageOptions::default();
        let completed = repo
            .sessions_by_status(SessionStatus::Completed, None, &opts)
            .unwrap();
        assert_eq!(completed.items.len(), 2);

        let completed_a = repo
            .sessions_by_status(SessionStatus::Completed, Some("a"), &opts)
            .unwrap();
        assert_eq!(completed_a.items.len(), 1);

        let mcp = repo.recent_sessions(Some("mcp"), &opts).unwrap();
        assert_eq!(mcp.items.len(), 2);
        let all = repo.recent_sessions(None, &opts).unwrap();
        assert_eq!(all.items.len(), 3);
    }

    #[test]
    fn delete_and_count() {
        let repo = repo();
        let s = repo
            .create_session("a", vec![], "ui", SessionStatus::Completed)
            .unwrap();
        repo.create_session("a", vec![], "ui", SessionStatus::Completed)
            .unwrap();
        repo.create_session("b", vec![], "ui", SessionStatus::Completed)
            .unwrap();

        assert_eq!(repo.session_count_by_agent("a").unwrap(), 2);
        assert!(repo.delete_session(&s.id).unwrap());
        assert!(!repo.delete_session(&s.id).unwrap());
        assert_eq!(repo.session_count_by_agent("a").unwrap(), 1);
        assert_eq!(repo.delete_sessions_by_agent("a").unwrap(), 1);
        assert_eq!(repo.session_count_by_agent("b").unwrap(), 1);
    }

    #[test]
    fn cleanup_keeps_most_recent_per_agent() {
        let repo = repo();
        let mut ids = Vec::new();
        for i in 0..4 {
            let s = repo
                .create_session("a", vec![], "ui", SessionStatus::Completed)
                .unwrap();
            set_times(&repo, &s.id, i, i);
            ids.push(s.id);
        }
        repo.create_session("b", vec![], "ui", SessionStatus::Completed)
            .unwrap();

        let deleted = repo.cleanup_old_sessions(2).unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.get(&ids[0]).unwrap().is_none());
        assert!(repo.get(&ids[1]).unwrap().is_none());
        assert!(repo.get(&ids[3]).unwrap().is_some());
        assert_eq!(repo.session_count_by_agent("b").unwrap(), 1);
    }
}
