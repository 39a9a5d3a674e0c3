use mcp_router_common::{
    PageOptions, RequestLogFilters, RequestLogPage, ResponseStatus, RouterError, Session,
};

use super::format_time;
use crate::boot::Runtime;
use crate::cli::{LogsArgs, SessionsCommand};

pub fn sessions(runtime: &Runtime, action: SessionsCommand) -> Result<(), RouterError> {
    let repo = runtime.ctx.sessions()?;
    match action {
        SessionsCommand::List {
            agent,
            limit,
            cursor,
        } => {
            let mut opts =
                PageOptions::default().with_limit(limit.unwrap_or(runtime.config.sessions.page_size));
            if let Some(cursor) = cursor {
                opts = opts.with_cursor(cursor);
            }
            let page = match agent.as_deref() {
                Some(agent_id) => repo.sessions_by_agent(agent_id, &opts)?,
                None => repo.recent_sessions(None, &opts)?,
            };
            if page.items.is_empty() {
                println!("no sessions");
            }
            for session in &page.items {
                println!("{}", session_line(session));
            }
            if let Some(next) = page.next_cursor.as_deref().filter(|_| page.has_more) {
                println!("more: --cursor {next}");
            }
        }
        SessionsCommand::Show { id } => {
            let session = repo
                .get(&id)?
                .ok_or_else(|| RouterError::Other(format!("session not found: {id}")))?;
            let json = serde_json::to_string_pretty(&session)
                .map_err(|e| RouterError::Other(e.to_string()))?;
            println!("{json}");
        }
        SessionsCommand::Delete { id } => {
            if !repo.delete_session(&id)? {
                return Err(RouterError::Other(format!("session not found: {id}")));
            }
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn session_line(session: &Session) -> String {
    let preview = session
        .messages
        .iter()
        .find(|m| m.role == mcp_router_common::Role::User)
        .map(|m| truncate(&m.content, 60))
        .unwrap_or_default();
    format!(
        "{}  {}  agent={}  {} msg  {}  {}",
        session.id,
        format_time(session.updated_at),
        session.agent_id,
        session.messages.len(),
        session.status,
        preview
    )
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max).collect();
    format!("{cut}...")
}

pub async fn logs(runtime: &Runtime, args: LogsArgs) -> Result<(), RouterError> {
    let filters = RequestLogFilters {
        client_id: args.client,
        server_id: args.server,
        request_type: args.request_type,
        response_status: args.errors.then_some(ResponseStatus::Error),
        ..Default::default()
    };
    let platform = runtime.platform()?;
    let page = platform
        .logs()
        .query(&filters, args.cursor.as_deref(), args.limit)
        .await?;
    print_logs(&page);
    Ok(())
}

fn print_logs(page: &RequestLogPage) {
    if page.items.is_empty() {
        println!("no requests");
        return;
    }
    for entry in &page.items {
        let mut line = format!(
            "{}  {:<7}  {}  {} -> {}  {}ms",
            format_time(entry.timestamp),
            entry.response_status.as_str(),
            entry.request_type,
            entry.client_name,
            entry.server_name,
            entry.duration
        );
        if let Some(error) = &entry.error_message {
            line.push_str(&format!("  {error}"));
        }
        println!("{line}");
    }
    println!("{} of {} request(s)", page.items.len(), page.total);
    if let Some(next) = page.next_cursor.as_deref().filter(|_| page.has_more) {
        println!("more: --cursor {next}");
    }
}
