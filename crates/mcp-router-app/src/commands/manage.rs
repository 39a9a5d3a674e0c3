//! Agent, server, workspace and auth management commands.

use mcp_router_common::{
    AgentConfig, McpServerConfig, RouterError, ServerType, ToolPermission, Workspace,
    WorkspaceType,
};
use mcp_router_config::paths;
use mcp_router_platform::{Credentials, PlatformApi};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{format_time, split_pair};
use crate::boot::Runtime;
use crate::cli::{AgentsCommand, AuthCommand, ServersCommand, WorkspacesCommand};

/// Groups `SERVER_ID:TOOL` flags into per-server permission lists.
fn tool_permissions(
    tools: &[String],
) -> Result<BTreeMap<String, Vec<ToolPermission>>, RouterError> {
    let mut permissions: BTreeMap<String, Vec<ToolPermission>> = BTreeMap::new();
    for raw in tools {
        let (server_id, tool_name) = split_pair(raw, ':')?;
        if tool_name.is_empty() {
            return Err(RouterError::Other(format!("missing tool name in {raw:?}")));
        }
        let list = permissions.entry(server_id).or_default();
        if !list.iter().any(|t| t.tool_name == tool_name) {
            list.push(ToolPermission {
                tool_name,
                description: String::new(),
                input_schema: Value::Null,
                enabled: true,
            });
        }
    }
    Ok(permissions)
}

pub async fn agents(runtime: &Runtime, action: AgentsCommand) -> Result<(), RouterError> {
    let platform = runtime.platform()?;
    let agents = platform.agents();
    match action {
        AgentsCommand::List => {
            let list = agents.list().await?;
            if list.is_empty() {
                println!("no agents");
            }
            for agent in list {
                let tools: usize = agent.tool_permissions.values().map(Vec::len).sum();
                println!(
                    "{}  {}  servers={}  tools={}{}",
                    agent.id,
                    agent.name,
                    agent.mcp_servers.len(),
                    tools,
                    if agent.auto_execute_tool { "  auto" } else { "" }
                );
            }
        }
        AgentsCommand::Add {
            name,
            instructions,
            purpose,
            description,
            tools,
            auto_execute,
            server_agent_id,
        } => {
            let tool_permissions = tool_permissions(&tools)?;
            let agent = AgentConfig {
                name,
                instructions,
                purpose,
                description,
                mcp_servers: tool_permissions.keys().cloned().collect(),
                tool_permissions,
                auto_execute_tool: auto_execute,
                server_agent_id,
                ..Default::default()
            };
            let agent = agents.create(agent).await?;
            println!("added agent {} ({})", agent.id, agent.name);
        }
        AgentsCommand::Remove { id } => {
            if !agents.delete(&id).await? {
                return Err(RouterError::Other(format!("agent not found: {id}")));
            }
            println!("removed agent {id}");
        }
    }
    Ok(())
}

pub async fn servers(runtime: &Runtime, action: ServersCommand) -> Result<(), RouterError> {
    let platform = runtime.platform()?;
    let servers = platform.servers();
    match action {
        ServersCommand::List => {
            let list = servers.list().await?;
            if list.is_empty() {
                println!("no servers");
            }
            for server in list {
                let target = match server.config.server_type {
                    ServerType::Local => {
                        let mut parts = server.config.command.clone().into_iter().collect::<Vec<_>>();
                        parts.extend(server.config.args.iter().cloned());
                        parts.join(" ")
                    }
                    ServerType::Remote => server.config.remote_url.clone().unwrap_or_default(),
                };
                let mut line = format!(
                    "{}  {}  {}  {}",
                    server.config.id, server.config.name, server.status, target
                );
                if let Some(error) = &server.error_message {
                    line.push_str(&format!("  ({error})"));
                }
                println!("{line}");
            }
        }
        ServersCommand::Add {
            name,
            command,
            args,
            env,
            remote_url,
            auto_start,
        } => {
            let env = env
                .iter()
                .map(|raw| split_pair(raw, '='))
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            let server_type = if remote_url.is_some() {
                ServerType::Remote
            } else if command.is_some() {
                ServerType::Local
            } else {
                return Err(RouterError::Other(
                    "a server needs --command or --remote-url".into(),
                ));
            };
            let server = servers
                .create(McpServerConfig {
                    name,
                    server_type,
                    command,
                    args,
                    env,
                    remote_url,
                    auto_start,
                    ..Default::default()
                })
                .await?;
            println!("added server {} ({})", server.config.id, server.config.name);
        }
        ServersCommand::Remove { id } => {
            servers.delete(&id).await?;
            println!("removed server {id}");
        }
        ServersCommand::Start { id } => {
            servers.start(&id).await?;
            let status = servers.status(&id).await?;
            println!("{id}: {}", status.state);
            if let Some(error) = status.error {
                return Err(RouterError::Other(error));
            }
            if runtime.workspace.workspace_type == WorkspaceType::Local {
                if let Some(client) = runtime.supervisor.client(&id).await {
                    for tool in client.list_tools().await? {
                        match tool.description.as_deref().filter(|d| !d.is_empty()) {
                            Some(description) => println!("  {}  {description}", tool.name),
                            None => println!("  {}", tool.name),
                        }
                    }
                }
                servers.stop(&id).await?;
            }
        }
        ServersCommand::Status { id } => {
            let status = servers.status(&id).await?;
            let mut line = format!("{id}: {}", status.state);
            if let Some(at) = status.connected_at {
                line.push_str(&format!("  since {}", format_time(at)));
            }
            if let Some(stats) = status.stats {
                line.push_str(&format!(
                    "  requests={} errors={} uptime={}s",
                    stats.requests, stats.errors, stats.uptime
                ));
            }
            if let Some(error) = status.error {
                line.push_str(&format!("  ({error})"));
            }
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn workspaces(runtime: &mut Runtime, action: WorkspacesCommand) -> Result<(), RouterError> {
    match action {
        WorkspacesCommand::List => {
            for ws in runtime.local.workspaces().list().await? {
                let marker = if ws.id == runtime.workspace.id { "*" } else { " " };
                let target = match (&ws.local_config, &ws.remote_config) {
                    (_, Some(remote)) => remote.api_url.clone(),
                    (Some(local), None) => local.database_path.clone(),
                    (None, None) => String::new(),
                };
                println!(
                    "{marker} {}  {}  {}  {}",
                    ws.id, ws.name, ws.workspace_type, target
                );
            }
        }
        WorkspacesCommand::Add {
            name,
            database_path,
            api_url,
        } => {
            let ws = match (database_path, api_url) {
                (_, Some(api_url)) => Workspace::remote(name, api_url),
                (Some(path), None) => Workspace::local(name, path),
                (None, None) => {
                    let mut ws = Workspace::local(name, "");
                    let path = paths::workspace_database_path(&ws.id)?;
                    ws.local_config = Some(mcp_router_common::LocalWorkspaceConfig {
                        database_path: path.to_string_lossy().into_owned(),
                    });
                    ws
                }
            };
            let ws = runtime.local.workspaces().create(ws).await?;
            println!("added workspace {} ({})", ws.id, ws.name);
        }
        WorkspacesCommand::Switch { id } => {
            let ws = runtime.switch_workspace(&id).await?;
            println!("switched to {} ({})", ws.name, ws.workspace_type);
        }
    }
    Ok(())
}

pub async fn auth(runtime: &Runtime, action: AuthCommand) -> Result<(), RouterError> {
    match action {
        AuthCommand::Status => {
            let state = runtime.auth.snapshot();
            if !state.is_authenticated {
                println!("not logged in");
                return Ok(());
            }
            match state.user_id {
                Some(user_id) => println!("logged in as {user_id}"),
                None => println!("logged in"),
            }
            if let Some(credits) = state.credits {
                println!("credits: {credits}");
            }
        }
        AuthCommand::Login { token, user_id } => {
            runtime.auth.login(Credentials { token, user_id }).await?;
            println!("logged in");
        }
        AuthCommand::Logout => {
            runtime.auth.logout().await?;
            println!("logged out");
        }
    }
    Ok(())
}
