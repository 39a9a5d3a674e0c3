//! Cursor pagination shared by the listing queries.
//!
//! Cursors are `"{timestamp}_{id}"`. Rows are ordered by timestamp and
//! then id, so rows sharing a millisecond never straddle a page boundary.

use mcp_router_common::{CursorPage, PageOptions};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};

use crate::error::StoreError;

pub(crate) fn format_cursor(ts: i64, id: &str) -> String {
    format!("{ts}_{id}")
}

pub(crate) fn parse_cursor(cursor: &str) -> Result<(i64, &str), StoreError> {
    let (ts, id) = cursor
        .split_once('_')
        .ok_or_else(|| StoreError::InvalidCursor(cursor.to_string()))?;
    let ts = ts
        .parse()
        .map_err(|_| StoreError::InvalidCursor(cursor.to_string()))?;
    Ok((ts, id))
}

/// `SELECT {columns} FROM {table} WHERE {filter...}`.
pub(crate) struct PageQuery<'a> {
    pub table: &'a str,
    pub columns: &'a str,
    pub filter: Vec<(&'a str, SqlValue)>,
}

/// Runs a `PageQuery` one page at a time.
///
/// Fetches `limit + 1` rows ordered by `opts.order_by` then `id`; the extra
/// row only decides `has_more`. `next_cursor` points at the last returned
/// row and is set only when more rows exist.
pub(crate) fn fetch_page<R, T>(
    conn: &Connection,
    query: PageQuery<'_>,
    opts: &PageOptions,
    map_row: impl Fn(&Row<'_>) -> rusqlite::Result<R>,
    convert: impl Fn(R) -> Result<T, StoreError>,
    cursor_of: impl Fn(&T) -> String,
) -> Result<CursorPage<T>, StoreError> {
    let column = opts.order_by.column();
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<SqlValue> = Vec::new();

    for (clause, value) in query.filter {
        clauses.push(clause.to_string());
        args.push(value);
    }

    if let Some(cursor) = &opts.cursor {
        let (ts, id) = parse_cursor(cursor)?;
        let op = opts.order.cursor_operator();
        clauses.push(format!("({column} {op} ? OR ({column} = ? AND id {op} ?))"));
        args.push(SqlValue::Integer(ts));
        args.push(SqlValue::Integer(ts));
        args.push(SqlValue::Text(id.to_string()));
    }

    let where_clause = if clauses.is_empty() {
        "1=1".to_string()
    } else {
        clauses.join(" AND ")
    };

    let limit = opts.limit as usize;
    args.push(SqlValue::Integer(limit as i64 + 1));

    let sql = format!(
        "SELECT {} FROM {} WHERE {where_clause} ORDER BY {column} {order}, id {order} LIMIT ?",
        query.columns,
        query.table,
        order = opts.order.keyword()
    );

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(args), map_row)?
        .collect::<rusqlite::Result<Vec<R>>>()?;

    let has_more = raw.len() > limit;
    let items = raw
        .into_iter()
        .take(limit)
        .map(convert)
        .collect::<Result<Vec<T>, StoreError>>()?;

    let next_cursor = if has_more {
        items.last().map(cursor_of)
    } else {
        None
    };

    Ok(CursorPage {
        items,
        has_more,
        next_cursor,
    })
}
