//! Tool execution over MCP.
//!
//! A tool call is routed to the first running server the agent is allowed
//! to use for that tool. Every call that reaches a server is written to the
//! request log.

use async_trait::async_trait;
use mcp_router_agent::{ToolError, ToolExecutor, ToolOutcome};
use mcp_router_common::{AgentConfig, RequestLogInput, ResponseStatus};
use mcp_router_store::StoreContext;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::supervisor::{CallToolResult, ServerSupervisor};

pub const CLIENT_ID: &str = "mcp-router-agent";

pub struct McpToolExecutor {
    ctx: Arc<StoreContext>,
    supervisor: Arc<ServerSupervisor>,
}

impl McpToolExecutor {
    pub fn new(ctx: Arc<StoreContext>, supervisor: Arc<ServerSupervisor>) -> Self {
        Self { ctx, supervisor }
    }

    fn agent(&self, agent_id: &str) -> Result<AgentConfig, ToolError> {
        self.ctx
            .agents()
            .and_then(|repo| repo.get_agent(agent_id))
            .map_err(|e| ToolError::Other(e.to_string()))?
            .ok_or_else(|| ToolError::Other(format!("agent not found: {agent_id}")))
    }

    fn log_call(
        &self,
        agent: &AgentConfig,
        server_id: &str,
        tool_name: &str,
        arguments: &Value,
        started: Instant,
        result: &Result<CallToolResult, String>,
    ) {
        let server_name = self
            .ctx
            .servers()
            .and_then(|repo| repo.get_server(server_id))
            .ok()
            .flatten()
            .map(|s| s.name)
            .unwrap_or_else(|| server_id.to_string());

        let (response_status, response_data, error_message) = match result {
            Ok(r) if r.is_error => (ResponseStatus::Error, serde_json::to_value(r).ok(), Some(r.text())),
            Ok(r) => (ResponseStatus::Success, serde_json::to_value(r).ok(), None),
            Err(e) => (ResponseStatus::Error, None, Some(e.clone())),
        };

        let input = RequestLogInput {
            client_id: CLIENT_ID.to_string(),
            client_name: agent.name.clone(),
            server_id: server_id.to_string(),
            server_name,
            request_type: "CallTool".to_string(),
            request_params: serde_json::json!({ "name": tool_name, "arguments": arguments }),
            response_status,
            response_data,
            duration: started.elapsed().as_millis() as i64,
            error_message,
        };
        if let Err(e) = self.ctx.request_logs().and_then(|repo| repo.add_entry(input)) {
            warn!(server_id, tool = tool_name, error = %e, "failed to write request log");
        }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(
        &self,
        agent_id: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<ToolOutcome, ToolError> {
        let agent = self.agent(agent_id)?;
        let candidates: Vec<String> = agent.servers_for_tool(tool_name).map(String::from).collect();
        if candidates.is_empty() {
            return Err(ToolError::NotPermitted {
                tool: tool_name.to_string(),
                agent_id: agent_id.to_string(),
            });
        }

        let mut target = None;
        for server_id in &candidates {
            if let Some(client) = self.supervisor.client(server_id).await {
                target = Some((server_id.as_str(), client));
                break;
            }
        }
        let Some((server_id, client)) = target else {
            return Err(ToolError::Transport(format!(
                "no running server provides {tool_name}"
            )));
        };

        debug!(agent_id, server_id, tool = tool_name, "calling MCP tool");
        let started = Instant::now();
        let result = client
            .call_tool(tool_name, arguments)
            .await
            .map_err(|e| e.to_string());
        let ok = matches!(&result, Ok(r) if !r.is_error);
        self.supervisor.record(server_id, ok).await;
        self.log_call(&agent, server_id, tool_name, arguments, started, &result);

        match result {
            Ok(r) if r.is_error => Ok(ToolOutcome::Failure(r.text())),
            Ok(r) => serde_json::to_value(&r)
                .map(ToolOutcome::Success)
                .map_err(|e| ToolError::Other(e.to_string())),
            Err(e) => Err(ToolError::Transport(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_router_common::{RequestLogFilters, ToolPermission};
    use mcp_router_store::Database;
    use serde_json::json;

    fn setup() -> (Arc<StoreContext>, Arc<ServerSupervisor>, McpToolExecutor) {
        let ctx = Arc::new(StoreContext::bound_to(Database::open_in_memory().unwrap()));
        let supervisor = Arc::new(ServerSupervisor::default());
        let executor = McpToolExecutor::new(ctx.clone(), supervisor.clone());
        (ctx, supervisor, executor)
    }

    fn agent_with_tool(ctx: &StoreContext, server_id: &str, tool: &str) -> AgentConfig {
        let mut agent = AgentConfig {
            name: "helper".into(),
            ..Default::default()
        };
        agent.tool_permissions.insert(
            server_id.into(),
            vec![ToolPermission {
                tool_name: tool.into(),
                description: String::new(),
                input_schema: json!({}),
                enabled: true,
            }],
        );
        ctx.agents().unwrap().add_agent(agent).unwrap()
    }

    #[tokio::test]
    async fn unknown_agent_is_error() {
        let (_ctx, _sup, executor) = setup();
        let err = executor.execute("ghost", "ping", &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("agent not found"));
    }

    #[tokio::test]
    async fn tool_without_permission_is_refused() {
        let (ctx, _sup, executor) = setup();
        let agent = agent_with_tool(&ctx, "srv-1", "ping");
        let err = executor.execute(&agent.id, "other", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotPermitted { .. }));
    }

    #[tokio::test]
    async fn permitted_server_not_running() {
        let (ctx, _sup, executor) = setup();
        let agent = agent_with_tool(&ctx, "srv-1", "ping");
        let err = executor.execute(&agent.id, "ping", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Transport(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn call_is_routed_and_logged() {
        use mcp_router_common::McpServerConfig;

        let (ctx, supervisor, executor) = setup();
        let server = ctx
            .servers()
            .unwrap()
            .add_server(McpServerConfig {
                name: "fake".into(),
                command: Some("sh".into()),
                args: vec!["-c".into(), crate::supervisor::FAKE_SERVER_SCRIPT.into()],
                ..Default::default()
            })
            .unwrap();
        supervisor.start(&server).await.unwrap();
        let agent = agent_with_tool(&ctx, &server.id, "ping");

        let outcome = executor.execute(&agent.id, "ping", &json!({"n": 1})).await.unwrap();
        match outcome {
            ToolOutcome::Success(value) => assert_eq!(value["content"][0]["text"], "pong"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let page = ctx
            .request_logs()
            .unwrap()
            .query(&RequestLogFilters::default(), None, 10)
            .unwrap();
        assert_eq!(page.items.len(), 1);
        let entry = &page.items[0];
        assert_eq!(entry.client_id, CLIENT_ID);
        assert_eq!(entry.client_name, "helper");
        assert_eq!(entry.server_name, "fake");
        assert_eq!(entry.request_type, "CallTool");
        assert_eq!(entry.response_status, ResponseStatus::Success);
        assert_eq!(entry.request_params["arguments"]["n"], 1);

        supervisor.stop_all().await;
    }
}
