use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One MCP request handled on behalf of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub id: String,
    pub timestamp: i64,
    pub client_id: String,
    pub client_name: String,
    pub server_id: String,
    pub server_name: String,
    pub request_type: String,
    #[serde(default)]
    pub request_params: Value,
    pub response_status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
    /// Milliseconds.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A log entry before the store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogInput {
    pub client_id: String,
    pub client_name: String,
    pub server_id: String,
    pub server_name: String,
    pub request_type: String,
    #[serde(default)]
    pub request_params: Value,
    pub response_status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RequestLogInput {
    pub fn into_entry(self, id: String, timestamp: i64) -> RequestLogEntry {
        RequestLogEntry {
            id,
            timestamp,
            client_id: self.client_id,
            client_name: self.client_name,
            server_id: self.server_id,
            server_name: self.server_name,
            request_type: self.request_type,
            request_params: self.request_params,
            response_status: self.response_status,
            response_data: self.response_data,
            duration: self.duration,
            error_message: self.error_message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestLogFilters {
    pub client_id: Option<String>,
    pub server_id: Option<String>,
    pub request_type: Option<String>,
    /// Inclusive lower bound, epoch millis.
    pub start_date: Option<i64>,
    /// Inclusive upper bound, epoch millis.
    pub end_date: Option<i64>,
    pub response_status: Option<ResponseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogPage {
    pub items: Vec<RequestLogEntry>,
    pub total: u64,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
