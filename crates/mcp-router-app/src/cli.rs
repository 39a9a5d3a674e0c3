use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// MCP Router: run agent chats against MCP servers from the terminal.
#[derive(Parser, Debug)]
#[command(name = "mcp-router", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error or a filter
    /// directive).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one query to an agent and stream the answer.
    Chat(ChatArgs),
    /// Manage agents.
    Agents {
        #[command(subcommand)]
        action: AgentsCommand,
    },
    /// Browse saved chat sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Manage MCP servers.
    Servers {
        #[command(subcommand)]
        action: ServersCommand,
    },
    /// Show the MCP request log.
    Logs(LogsArgs),
    /// Manage workspaces.
    Workspaces {
        #[command(subcommand)]
        action: WorkspacesCommand,
    },
    /// Manage the stored user token.
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Delete the oldest sessions beyond the per-agent limit.
    Cleanup {
        /// Sessions to keep per agent. Defaults to `[sessions]
        /// max_sessions_per_agent`.
        #[arg(long)]
        max_per_agent: Option<u32>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct ChatArgs {
    /// Agent id.
    #[arg(long)]
    pub agent: String,

    /// Continue this saved session instead of starting a new one.
    #[arg(long)]
    pub session: Option<String>,

    /// Session source recorded with the saved transcript.
    #[arg(long)]
    pub source: Option<String>,

    /// Query text.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum AgentsCommand {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        instructions: String,
        #[arg(long, default_value = "")]
        purpose: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Allowed tool as `SERVER_ID:TOOL`. Repeatable.
        #[arg(long = "tool")]
        tools: Vec<String>,
        /// Run tool calls without asking.
        #[arg(long)]
        auto_execute: bool,
        /// Agent id used by the completion service.
        #[arg(long)]
        server_agent_id: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    List {
        /// Only sessions of this agent.
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServersCommand {
    List,
    Add {
        name: String,
        /// Command for a stdio server.
        #[arg(long, conflicts_with = "remote_url")]
        command: Option<String>,
        /// Argument passed to the command. Repeatable.
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Environment variable as `KEY=VALUE`. Repeatable.
        #[arg(long = "env")]
        env: Vec<String>,
        /// URL of a remote server.
        #[arg(long)]
        remote_url: Option<String>,
        #[arg(long)]
        auto_start: bool,
    },
    Remove {
        id: String,
    },
    /// Start a server, list its tools and stop it again.
    Start {
        id: String,
    },
    Status {
        id: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct LogsArgs {
    #[arg(long)]
    pub server: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    #[arg(long)]
    pub request_type: Option<String>,
    /// Only failed requests.
    #[arg(long)]
    pub errors: bool,
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum WorkspacesCommand {
    List,
    Add {
        name: String,
        /// Database file of a local workspace.
        #[arg(long, conflicts_with = "api_url")]
        database_path: Option<String>,
        /// API URL of a remote workspace.
        #[arg(long)]
        api_url: Option<String>,
    },
    Switch {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    Status,
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user_id: Option<String>,
    },
    Logout,
}

pub fn parse() -> Args {
    Args::parse()
}
