mod chat;
mod history;
mod manage;

use mcp_router_common::RouterError;
use std::process::ExitCode;

use crate::boot::Runtime;
use crate::cli::Command;

pub async fn run(runtime: &mut Runtime, command: Command) -> Result<ExitCode, RouterError> {
    match command {
        Command::Chat(args) => return chat::run(runtime, args).await,
        Command::Agents { action } => manage::agents(runtime, action).await?,
        Command::Sessions { action } => history::sessions(runtime, action)?,
        Command::Servers { action } => manage::servers(runtime, action).await?,
        Command::Logs(args) => history::logs(runtime, args).await?,
        Command::Workspaces { action } => manage::workspaces(runtime, action).await?,
        Command::Auth { action } => manage::auth(runtime, action).await?,
        Command::Cleanup { max_per_agent } => {
            let max = max_per_agent.unwrap_or(runtime.config.sessions.max_sessions_per_agent);
            let removed = runtime.cleanup(max)?;
            println!("removed {removed} session(s), keeping at most {max} per agent");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `KEY=VALUE` → `(KEY, VALUE)`.
pub(crate) fn split_pair(raw: &str, separator: char) -> Result<(String, String), RouterError> {
    match raw.split_once(separator) {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(RouterError::Other(format!(
            "expected KEY{separator}VALUE, got {raw:?}"
        ))),
    }
}

pub(crate) fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
