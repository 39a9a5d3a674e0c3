use serde::{Deserialize, Serialize};

use super::chat::{FinishReason, UiMessage};
use crate::id::SessionKey;

/// Progress of one exchange as seen by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    Start {
        query: String,
    },
    #[serde(rename_all = "camelCase")]
    Chunk {
        text: String,
        message_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInvocation {
        message_id: String,
        /// Complete snapshot of the assistant message.
        message: UiMessage,
    },
    #[serde(rename_all = "camelCase")]
    End {
        finish_reason: FinishReason,
        can_continue: bool,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Finish,
    Error,
}

/// A `StreamEvent` addressed to one background session key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEnvelope {
    pub session_key: SessionKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history_session_id: Option<String>,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    pub event: StreamEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    pub agent_id: String,
}
