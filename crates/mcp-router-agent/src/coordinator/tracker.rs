//! Turns successive message snapshots into chunk and tool events.

use mcp_router_common::{UiMessage, UiRole};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Emission {
    Chunk { message_id: String, text: String },
    ToolInvocation { message: UiMessage },
}

#[derive(Debug, Default)]
pub(crate) struct StreamTracker {
    previous: Vec<UiMessage>,
    /// `"{id}-{len}"` of every chunk already emitted.
    streamed: HashSet<String>,
}

impl StreamTracker {
    pub(crate) fn observe(&mut self, messages: &[UiMessage]) -> Vec<Emission> {
        let mut emissions = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if message.role != UiRole::Assistant {
                continue;
            }
            let previous = self.previous.get(index);

            if message.has_tool_invocations() {
                if previous.is_none_or(|p| p.parts != message.parts) {
                    emissions.push(Emission::ToolInvocation {
                        message: message.clone(),
                    });
                }
                continue;
            }

            if message.content.trim().is_empty() {
                continue;
            }
            if previous.is_some_and(|p| p.content == message.content) {
                continue;
            }
            let fingerprint = format!("{}-{}", message.id, message.content.len());
            if self.streamed.insert(fingerprint) {
                emissions.push(Emission::Chunk {
                    message_id: message.id.clone(),
                    text: message.content.clone(),
                });
            }
        }
        self.previous = messages.to_vec();
        emissions
    }
}
