//! Completion engine abstraction.
//!
//! An engine hands out one `EngineConversation` per exchange. The
//! conversation accepts appended messages and tool results and yields
//! `EngineEvent`s until it finishes.

pub mod data_stream;
pub mod http;

use async_trait::async_trait;
use mcp_router_common::{FinishReason, ToolCall, UiMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

pub use http::{HttpEngine, HttpEngineConfig};

/// A tool offered to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub struct EngineRequest {
    pub agent_id: String,
    pub tools: Vec<ToolDescriptor>,
    pub auth_token: Option<String>,
    pub initial_messages: Vec<UiMessage>,
    /// Cancelled when the exchange is stopped.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultSubmission {
    pub tool_call_id: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Full message list after a change.
    Messages(Vec<UiMessage>),
    ToolCall(ToolCall),
    Finish(FinishReason),
    Error(String),
}

#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn connect(
        &self,
        request: EngineRequest,
    ) -> Result<Box<dyn EngineConversation>, EngineError>;
}

#[async_trait]
pub trait EngineConversation: Send {
    async fn append(&mut self, message: UiMessage) -> Result<(), EngineError>;

    async fn add_tool_result(&mut self, submission: ToolResultSubmission)
        -> Result<(), EngineError>;

    /// Stop the in-flight request. Later `next_event` calls return `None`.
    fn abort(&mut self);

    /// Next event, or `None` once the conversation is over.
    async fn next_event(&mut self) -> Option<EngineEvent>;
}
