//! Conversions between stored chat history and engine messages.

use mcp_router_common::{
    new_id, now_millis, AgentConfig, ChatMessage, MessagePart, Role, ToolCall, ToolInvocation,
    ToolInvocationState, ToolResult, UiMessage, UiRole,
};

use crate::engine::ToolDescriptor;

pub(crate) const SYSTEM_MESSAGE_ID: &str = "system-1";

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn history_message(message: &ChatMessage) -> UiMessage {
    let id = if message.id.is_empty() {
        format!(
            "{}-{}-{}",
            role_name(message.role),
            message.timestamp,
            &new_id()[..8]
        )
    } else {
        message.id.clone()
    };

    let mut parts = Vec::new();
    if !message.content.is_empty() {
        parts.push(MessagePart::Text {
            text: message.content.clone(),
        });
    }
    for call in message.tool_calls.iter().flatten() {
        let result = message
            .tool_results
            .iter()
            .flatten()
            .find(|r| r.tool_call_id == call.id)
            .map(|r| r.content.clone());
        parts.push(MessagePart::ToolInvocation {
            tool_invocation: ToolInvocation {
                state: if result.is_some() {
                    ToolInvocationState::Result
                } else {
                    ToolInvocationState::Call
                },
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                args: call.arguments.clone(),
                result,
            },
        });
    }

    UiMessage {
        id,
        role: message.role.into(),
        content: message.content.clone(),
        created_at: Some(message.timestamp),
        parts,
    }
}

/// The agent's instructions as `system-1`, then every non-system history
/// message in order.
pub(crate) fn initial_messages(agent: &AgentConfig, history: &[ChatMessage]) -> Vec<UiMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(UiMessage::new(
        SYSTEM_MESSAGE_ID,
        UiRole::System,
        agent.instructions.clone(),
    ));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(history_message),
    );
    messages
}

/// Every enabled tool across the agent's servers.
pub(crate) fn enabled_tools(agent: &AgentConfig) -> Vec<ToolDescriptor> {
    agent
        .tool_permissions
        .values()
        .flatten()
        .filter(|p| p.enabled)
        .map(|p| ToolDescriptor {
            name: p.tool_name.clone(),
            description: p.description.clone(),
            input_schema: p.input_schema.clone(),
        })
        .collect()
}

pub(crate) fn to_chat_messages(messages: &[UiMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter_map(|message| {
            let role = match message.role {
                UiRole::System => Role::System,
                UiRole::User => Role::User,
                UiRole::Assistant => Role::Assistant,
                UiRole::Data => return None,
            };
            let invocations: Vec<&ToolInvocation> = message.tool_invocations().collect();
            let (tool_calls, tool_results) = if invocations.is_empty() {
                (None, None)
            } else {
                let calls = invocations
                    .iter()
                    .map(|t| ToolCall {
                        id: t.tool_call_id.clone(),
                        name: t.tool_name.clone(),
                        arguments: t.args.clone(),
                    })
                    .collect();
                let results = invocations
                    .iter()
                    .filter_map(|t| {
                        t.result.as_ref().map(|content| ToolResult {
                            tool_call_id: t.tool_call_id.clone(),
                            content: content.clone(),
                            is_error: false,
                        })
                    })
                    .collect();
                (Some(calls), Some(results))
            };
            Some(ChatMessage {
                id: message.id.clone(),
                role,
                content: message.content.clone(),
                timestamp: message.created_at.unwrap_or_else(now_millis),
                tool_calls,
                tool_results,
            })
        })
        .collect()
}
