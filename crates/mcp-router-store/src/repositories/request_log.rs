//! MCP request log.
//!
//! Entries are listed newest first. The cursor is `"{timestamp}_{id}"` so
//! entries sharing a millisecond never straddle a page boundary.

use mcp_router_common::{
    new_id, now_millis, RequestLogEntry, RequestLogFilters, RequestLogInput, RequestLogPage,
    ResponseStatus,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::database::Database;
use crate::error::StoreError;
use crate::pagination::{format_cursor, parse_cursor};

const COLUMNS: &str = "id, timestamp, client_id, client_name, server_id, server_name, \
                       request_type, request_params, response_status, response_data, duration, error_message";

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS request_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            client_id TEXT NOT NULL,
            client_name TEXT NOT NULL,
            server_id TEXT NOT NULL,
            server_name TEXT NOT NULL,
            request_type TEXT NOT NULL,
            request_params TEXT,
            response_status TEXT NOT NULL,
            response_data TEXT,
            duration INTEGER NOT NULL,
            error_message TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_request_logs_timestamp ON request_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_request_logs_server_id ON request_logs(server_id);
        CREATE INDEX IF NOT EXISTS idx_request_logs_client_id ON request_logs(client_id);
        "#,
    )?;
    Ok(())
}

struct LogRow {
    id: String,
    timestamp: i64,
    client_id: String,
    client_name: String,
    server_id: String,
    server_name: String,
    request_type: String,
    request_params: Option<String>,
    response_status: String,
    response_data: Option<String>,
    duration: i64,
    error_message: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<LogRow> {
    Ok(LogRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        client_id: row.get(2)?,
        client_name: row.get(3)?,
        server_id: row.get(4)?,
        server_name: row.get(5)?,
        request_type: row.get(6)?,
        request_params: row.get(7)?,
        response_status: row.get(8)?,
        response_data: row.get(9)?,
        duration: row.get(10)?,
        error_message: row.get(11)?,
    })
}

fn into_entry(row: LogRow) -> Result<RequestLogEntry, StoreError> {
    let response_status = match row.response_status.as_str() {
        "success" => ResponseStatus::Success,
        "error" => ResponseStatus::Error,
        other => {
            return Err(StoreError::InvalidColumn {
                column: "response_status",
                value: other.to_string(),
            })
        }
    };
    Ok(RequestLogEntry {
        id: row.id,
        timestamp: row.timestamp,
        client_id: row.client_id,
        client_name: row.client_name,
        server_id: row.server_id,
        server_name: row.server_name,
        request_type: row.request_type,
        request_params: row
            .request_params
            .map(|p| serde_json::from_str(&p))
            .transpose()?
            .unwrap_or(serde_json::Value::Null),
        response_status,
        response_data: row
            .response_data
            .map(|d| serde_json::from_str(&d))
            .transpose()?,
        duration: row.duration,
        error_message: row.error_message,
    })
}

fn filter_clauses(filters: &RequestLogFilters) -> (Vec<&'static str>, Vec<SqlValue>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    if let Some(v) = &filters.client_id {
        clauses.push("client_id = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filters.server_id {
        clauses.push("server_id = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = &filters.request_type {
        clauses.push("request_type = ?");
        args.push(SqlValue::Text(v.clone()));
    }
    if let Some(v) = filters.start_date {
        clauses.push("timestamp >= ?");
        args.push(SqlValue::Integer(v));
    }
    if let Some(v) = filters.end_date {
        clauses.push("timestamp <= ?");
        args.push(SqlValue::Integer(v));
    }
    if let Some(v) = filters.response_status {
        clauses.push("response_status = ?");
        args.push(SqlValue::Text(v.as_str().to_string()));
    }
    (clauses, args)
}

#[derive(Debug, Clone)]
pub struct RequestLogRepository {
    db: Database,
}

impl RequestLogRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores `input` with a fresh id and the current timestamp.
    pub fn add_entry(&self, input: RequestLogInput) -> Result<RequestLogEntry, StoreError> {
        let entry = input.into_entry(new_id(), now_millis());
        self.insert(&entry)?;
        Ok(entry)
    }

    pub fn query(
        &self,
        filters: &RequestLogFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<RequestLogPage, StoreError> {
        let (mut clauses, mut args) = filter_clauses(filters);
        let where_total = if clauses.is_empty() {
            "1=1".to_string()
        } else {
            clauses.join(" AND ")
        };
        let total_args = args.clone();

        if let Some(cursor) = cursor {
            let (ts, id) = parse_cursor(cursor)?;
            clauses.push("(timestamp < ? OR (timestamp = ? AND id < ?))");
            args.push(SqlValue::Integer(ts));
            args.push(SqlValue::Integer(ts));
            args.push(SqlValue::Text(id.to_string()));
        }
        let where_page = if clauses.is_empty() {
            "1=1".to_string()
        } else {
            clauses.join(" AND ")
        };
        args.push(SqlValue::Integer(limit as i64 + 1));

        let (total, rows) = self.db.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM request_logs WHERE {where_total}"),
                params_from_iter(total_args),
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM request_logs WHERE {where_page}
                 ORDER BY timestamp DESC, id DESC LIMIT ?"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(args), read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((total, rows))
        })?;

        let has_more = rows.len() > limit as usize;
        let items = rows
            .into_iter()
            .take(limit as usize)
            .map(into_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let next_cursor = if has_more {
            items.last().map(|e| format_cursor(e.timestamp, &e.id))
        } else {
            None
        };

        Ok(RequestLogPage {
            items,
            total: total as u64,
            has_more,
            next_cursor,
        })
    }

    fn insert(&self, entry: &RequestLogEntry) -> Result<(), StoreError> {
        let request_params = serde_json::to_string(&entry.request_params)?;
        let response_data = entry
            .response_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO request_logs ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    entry.id,
                    entry.timestamp,
                    entry.client_id,
                    entry.client_name,
                    entry.server_id,
                    entry.server_name,
                    entry.request_type,
                    request_params,
                    entry.response_status.as_str(),
                    response_data,
                    entry.duration,
                    entry.error_message,
                ],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> RequestLogRepository {
        RequestLogRepository::new(Database::open_in_memory().unwrap())
    }

    fn input(server: &str, status: ResponseStatus) -> RequestLogInput {
        RequestLogInput {
            client_id: "mcp-router".into(),
            client_name: "MCP Router".into(),
            server_id: server.into(),
            server_name: format!("{server}-name"),
            request_type: "CallTool".into(),
            request_params: json!({"name": "lookup"}),
            response_status: status,
            response_data: Some(json!({"content": []})),
            duration: 12,
            error_message: None,
        }
    }

    fn insert_at(repo: &RequestLogRepository, id: &str, ts: i64) {
        let entry = input("s1", ResponseStatus::Success).into_entry(id.into(), ts);
        repo.insert(&entry).unwrap();
    }

    #[test]
    fn add_entry_assigns_id_and_timestamp() {
        let repo = repo();
        let entry = repo.add_entry(input("s1", ResponseStatus::Success)).unwrap();
        assert!(!entry.id.is_empty());
        assert!(entry.timestamp > 0);

        let page = repo.query(&RequestLogFilters::default(), None, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0], entry);
    }

    #[test]
    fn filters_narrow_results_and_total() {
        let repo = repo();
        repo.add_entry(input("s1", ResponseStatus::Success)).unwrap();
        repo.add_entry(input("s1", ResponseStatus::Error)).unwrap();
        repo.add_entry(input("s2", ResponseStatus::Success)).unwrap();

        let filters = RequestLogFilters {
            server_id: Some("s1".into()),
            ..Default::default()
        };
        let page = repo.query(&filters, None, 10).unwrap();
        assert_eq!(page.total, 2);

        let filters = RequestLogFilters {
            response_status: Some(ResponseStatus::Error),
            ..Default::default()
        };
        let page = repo.query(&filters, None, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].response_status, ResponseStatus::Error);
    }

    #[test]
    fn cursor_pages_through_equal_timestamps() {
        let repo = repo();
        insert_at(&repo, "a", 100);
        insert_at(&repo, "b", 100);
        insert_at(&repo, "c", 100);
        insert_at(&repo, "d", 50);

        let filters = RequestLogFilters::default();
        let first = repo.query(&filters, None, 2).unwrap();
        let ids: Vec<_> = first.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert!(first.has_more);
        assert_eq!(first.total, 4);

        let second = repo
            .query(&filters, first.next_cursor.as_deref(), 2)
            .unwrap();
        let ids: Vec<_> = second.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert!(!second.has_more);
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn date_range_filter() {
        let repo = repo();
        insert_at(&repo, "old", 10);
        insert_at(&repo, "mid", 20);
        insert_at(&repo, "new", 30);
        let filters = RequestLogFilters {
            start_date: Some(15),
            end_date: Some(25),
            ..Default::default()
        };
        let page = repo.query(&filters, None, 10).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "mid");
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        let err = repo()
            .query(&RequestLogFilters::default(), Some("garbage"), 10)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCursor(_)));
    }
}
