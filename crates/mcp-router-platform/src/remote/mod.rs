//! Platform for remote workspaces.
//!
//! MCP servers and request logs live on the remote service and are reached
//! over tRPC. Agents, settings and workspaces stay local.

pub mod trpc;

#[cfg(test)]
pub(crate) mod test_server;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mcp_router_common::{
    McpServer, McpServerConfig, McpServerPatch, RequestLogEntry, RequestLogFilters,
    RequestLogPage, ServerStatus,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use trpc::{unwrap_response, TrpcClient};

use crate::api::{
    AgentApi, LogApi, PlatformApi, PlatformResult, ServerApi, SettingsApi, WorkspaceApi,
};
use crate::error::PlatformError;
use crate::local::LocalPlatform;

/// `true`, `{"success": true}` and an empty body all count as success.
fn succeeded(value: &Value) -> bool {
    value
        .as_bool()
        .or_else(|| value.get("success").and_then(Value::as_bool))
        .unwrap_or(true)
}

pub struct RemoteServers {
    client: Arc<TrpcClient>,
}

#[async_trait]
impl ServerApi for RemoteServers {
    async fn list(&self) -> PlatformResult<Vec<McpServer>> {
        self.client.query("servers.list", &Value::Null).await
    }

    async fn get(&self, id: &str) -> PlatformResult<Option<McpServer>> {
        self.client.query("servers.get", &json!({ "id": id })).await
    }

    async fn create(&self, config: McpServerConfig) -> PlatformResult<McpServer> {
        self.client
            .mutate("servers.create", &json!({ "config": config }))
            .await
    }

    async fn update(&self, id: &str, patch: McpServerPatch) -> PlatformResult<McpServer> {
        self.client
            .mutate("servers.update", &json!({ "id": id, "config": patch }))
            .await
    }

    async fn delete(&self, id: &str) -> PlatformResult<()> {
        let _: Value = self.client.mutate("servers.delete", &json!({ "id": id })).await?;
        Ok(())
    }

    async fn start(&self, id: &str) -> PlatformResult<bool> {
        let value: Value = self.client.mutate("servers.start", &json!({ "id": id })).await?;
        Ok(succeeded(&value))
    }

    async fn stop(&self, id: &str) -> PlatformResult<bool> {
        let value: Value = self.client.mutate("servers.stop", &json!({ "id": id })).await?;
        Ok(succeeded(&value))
    }

    async fn status(&self, id: &str) -> PlatformResult<ServerStatus> {
        self.client
            .query("servers.getStatus", &json!({ "id": id }))
            .await
    }
}

fn iso(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// `logs.list` input: filter dates go out as ISO-8601 strings.
fn log_query_input(filters: &RequestLogFilters, cursor: Option<&str>, limit: u32) -> Value {
    let mut input = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            input.insert(key.to_string(), value);
        }
    };
    put("clientId", filters.client_id.clone().map(Value::from));
    put("serverId", filters.server_id.clone().map(Value::from));
    put("requestType", filters.request_type.clone().map(Value::from));
    put("startDate", filters.start_date.and_then(iso).map(Value::from));
    put("endDate", filters.end_date.and_then(iso).map(Value::from));
    put(
        "responseStatus",
        filters.response_status.map(|s| Value::from(s.as_str())),
    );
    put("cursor", cursor.map(Value::from));
    put("limit", Some(Value::from(limit)));
    Value::Object(input)
}

/// Timestamps may come back as ISO strings or epoch millis.
fn normalize_entry(mut entry: Value) -> Result<RequestLogEntry, PlatformError> {
    if let Some(ts) = entry.get("timestamp").and_then(Value::as_str) {
        let millis = DateTime::parse_from_rfc3339(ts)
            .map_err(|e| PlatformError::Decode(format!("timestamp {ts}: {e}")))?
            .timestamp_millis();
        entry["timestamp"] = Value::from(millis);
    }
    serde_json::from_value(entry).map_err(|e| PlatformError::Decode(e.to_string()))
}

fn normalize_page(body: Value) -> Result<RequestLogPage, PlatformError> {
    let items = body
        .get("logs")
        .or_else(|| body.get("items"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(normalize_entry)
        .collect::<Result<Vec<_>, _>>()?;
    let next_cursor = body
        .get("nextCursor")
        .and_then(Value::as_str)
        .map(String::from);
    Ok(RequestLogPage {
        total: body
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64),
        has_more: body
            .get("hasMore")
            .and_then(Value::as_bool)
            .unwrap_or(next_cursor.is_some()),
        next_cursor,
        items,
    })
}

pub struct RemoteLogs {
    client: Arc<TrpcClient>,
}

#[async_trait]
impl LogApi for RemoteLogs {
    async fn query(
        &self,
        filters: &RequestLogFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> PlatformResult<RequestLogPage> {
        let body: Value = self
            .client
            .query("logs.list", &log_query_input(filters, cursor, limit))
            .await?;
        normalize_page(body)
    }
}

pub struct RemotePlatform {
    servers: RemoteServers,
    logs: RemoteLogs,
    local: Arc<LocalPlatform>,
}

impl RemotePlatform {
    /// Fails with `MissingToken` when no user token is available.
    pub fn new(
        api_url: &str,
        token: Option<String>,
        timeout: Duration,
        local: Arc<LocalPlatform>,
    ) -> Result<Self, PlatformError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(PlatformError::MissingToken)?;
        let client = Arc::new(TrpcClient::new(api_url, token, timeout)?);
        info!(api_url = client.base_url(), "remote platform ready");
        Ok(Self {
            servers: RemoteServers {
                client: client.clone(),
            },
            logs: RemoteLogs { client },
            local,
        })
    }
}

impl PlatformApi for RemotePlatform {
    fn servers(&self) -> &dyn ServerApi {
        &self.servers
    }

    fn logs(&self) -> &dyn LogApi {
        &self.logs
    }

    fn agents(&self) -> &dyn AgentApi {
        self.local.agents()
    }

    fn settings(&self) -> &dyn SettingsApi {
        self.local.settings()
    }

    fn workspaces(&self) -> &dyn WorkspaceApi {
        self.local.workspaces()
    }
}
