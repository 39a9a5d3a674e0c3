//! One query/response exchange from start event to key release.

use mcp_router_common::{
    new_id, now_millis, FinishReason, NotificationType, StreamEnvelope, StreamEvent, ToolCall,
    UiMessage, UiRole, DEFAULT_SESSION_SOURCE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::guard::KeyGuard;
use super::tracker::{Emission, StreamTracker};
use super::transcript::{enabled_tools, initial_messages, to_chat_messages};
use super::{ExchangeOutcome, ExchangeRequest, SessionCoordinator};
use crate::engine::{EngineConversation, EngineEvent, EngineRequest, ToolResultSubmission};
use crate::error::{EngineError, PersistenceError};
use crate::tools::ToolOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    AwaitingResponse,
    Streaming,
    Persisting,
    Completed,
    Stopped,
    Errored,
}

impl ExchangeState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Errored)
    }
}

fn tool_error(message: String, fallback: &str) -> Value {
    let message = if message.is_empty() {
        fallback.to_string()
    } else {
        message
    };
    json!({ "error": message })
}

pub(super) struct Exchange<'a> {
    coordinator: &'a SessionCoordinator,
    request: ExchangeRequest,
    guard: Option<KeyGuard>,
    state: ExchangeState,
    tracker: StreamTracker,
    working: Vec<UiMessage>,
    cancel: CancellationToken,
}

impl<'a> Exchange<'a> {
    pub(super) fn new(
        coordinator: &'a SessionCoordinator,
        request: ExchangeRequest,
        guard: KeyGuard,
    ) -> Self {
        Self {
            coordinator,
            request,
            guard: Some(guard),
            state: ExchangeState::AwaitingResponse,
            tracker: StreamTracker::default(),
            working: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn enter(&mut self, next: ExchangeState) {
        if self.state.is_terminal() || self.state == next {
            return;
        }
        debug!(from = ?self.state, to = ?next, "exchange state");
        self.state = next;
    }

    fn emit(&self, event: StreamEvent, notification_type: Option<NotificationType>) {
        let request = &self.request;
        self.coordinator.transport.emit(StreamEnvelope {
            session_key: request.session_key.clone(),
            chat_history_session_id: request.chat_history_session_id.clone(),
            agent_id: request.agent_id.clone(),
            source: request.source.clone(),
            timestamp: now_millis(),
            notification_type,
            event,
        });
    }

    fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
    }

    /// Agent id used for tool routing and new sessions.
    fn owner_id(&self) -> &str {
        if self.request.agent.id.is_empty() {
            &self.request.agent_id
        } else {
            &self.request.agent.id
        }
    }

    /// Agent id sent to the completion endpoint.
    fn engine_agent_id(&self) -> String {
        self.request
            .agent
            .server_agent_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.request.agent_id.clone())
    }

    pub(super) async fn drive(mut self) -> ExchangeOutcome {
        // Subscribe before the start event so an early stop is not lost.
        let transport = Arc::clone(&self.coordinator.transport);
        let mut stop = transport.subscribe_stop();

        let query = self.request.query.trim().to_string();
        self.emit(
            StreamEvent::Start {
                query: query.clone(),
            },
            None,
        );

        let engine_request = EngineRequest {
            agent_id: self.engine_agent_id(),
            tools: enabled_tools(&self.request.agent),
            auth_token: self.request.auth_token.clone(),
            initial_messages: initial_messages(&self.request.agent, &self.request.history),
            cancel: self.cancel.clone(),
        };
        self.working = engine_request.initial_messages.clone();

        let mut conversation = match self.coordinator.engine.connect(engine_request).await {
            Ok(conversation) => conversation,
            Err(e) => return self.fail(format!("failed to start completion: {e}")),
        };
        let user = UiMessage::new(new_id(), UiRole::User, query);
        if let Err(e) = conversation.append(user.clone()).await {
            return self.fail(format!("failed to send query: {e}"));
        }
        self.working.push(user);

        let agent_id = self.request.agent_id.clone();
        let response_timeout = self.coordinator.settings.response_timeout;
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.next_for(&agent_id) => {
                    return self.stopped(conversation.as_mut());
                }
                next = tokio::time::timeout(response_timeout, conversation.next_event()) => next,
            };

            match next {
                Err(_) => {
                    conversation.abort();
                    return self.fail(format!(
                        "no response from completion engine within {response_timeout:?}"
                    ));
                }
                Ok(None) => {
                    return self.fail("completion stream closed unexpectedly".to_string());
                }
                Ok(Some(EngineEvent::Messages(messages))) => self.on_messages(messages),
                Ok(Some(EngineEvent::ToolCall(call))) => {
                    // Tools can run for a long time; a stop must still end the exchange.
                    let submitted = tokio::select! {
                        biased;
                        _ = stop.next_for(&agent_id) => None,
                        submitted = self.on_tool_call(conversation.as_mut(), call) => Some(submitted),
                    };
                    match submitted {
                        None => return self.stopped(conversation.as_mut()),
                        Some(Err(e)) => {
                            conversation.abort();
                            return self.fail(format!("failed to submit tool result: {e}"));
                        }
                        Some(Ok(())) => {}
                    }
                }
                Ok(Some(EngineEvent::Finish(reason))) => return self.finish(reason).await,
                Ok(Some(EngineEvent::Error(message))) => {
                    conversation.abort();
                    return self.fail(message);
                }
            }
        }
    }

    fn on_messages(&mut self, messages: Vec<UiMessage>) {
        self.enter(ExchangeState::Streaming);
        for emission in self.tracker.observe(&messages) {
            match emission {
                Emission::Chunk { message_id, text } => {
                    self.emit(StreamEvent::Chunk { text, message_id }, None)
                }
                Emission::ToolInvocation { message } => self.emit(
                    StreamEvent::ToolInvocation {
                        message_id: message.id.clone(),
                        message,
                    },
                    None,
                ),
            }
        }
        self.working = messages;
    }

    async fn on_tool_call(
        &mut self,
        conversation: &mut dyn EngineConversation,
        call: ToolCall,
    ) -> Result<(), EngineError> {
        if !self.request.agent.auto_execute_tool {
            debug!(tool = %call.name, "tool call left for manual execution");
            return Ok(());
        }

        let tool_timeout = self.coordinator.settings.tool_timeout;
        let started = Instant::now();
        let execution = self
            .coordinator
            .tools
            .execute(self.owner_id(), &call.name, &call.arguments);
        let result = match tokio::time::timeout(tool_timeout, execution).await {
            Ok(Ok(ToolOutcome::Success(value))) => value,
            Ok(Ok(ToolOutcome::Failure(message))) => tool_error(message, "Tool execution failed"),
            Ok(Err(e)) => tool_error(e.to_string(), "Auto tool execution failed"),
            Err(_) => json!({
                "error": format!("tool execution timed out after {tool_timeout:?}")
            }),
        };
        info!(
            tool = %call.name,
            tool_call_id = %call.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = result.get("error").is_some(),
            "tool executed"
        );

        conversation
            .add_tool_result(ToolResultSubmission {
                tool_call_id: call.id,
                result,
            })
            .await
    }

    async fn finish(&mut self, reason: FinishReason) -> ExchangeOutcome {
        let completed = reason == FinishReason::Stop;
        self.emit(
            StreamEvent::End {
                finish_reason: reason,
                can_continue: completed,
            },
            completed.then_some(NotificationType::Finish),
        );

        if !completed || self.working.len() <= 1 {
            info!(finish_reason = %reason, "exchange finished without saving");
            self.enter(ExchangeState::Completed);
            self.release();
            return ExchangeOutcome::Completed {
                finish_reason: reason,
                session_id: None,
            };
        }

        self.enter(ExchangeState::Persisting);
        match self.persist().await {
            Ok(session_id) => {
                info!(session_id = %session_id, "exchange saved");
                self.enter(ExchangeState::Completed);
                self.release();
                ExchangeOutcome::Completed {
                    finish_reason: reason,
                    session_id: Some(session_id),
                }
            }
            Err(e) => self.fail(format!("Session save failed: {e}")),
        }
    }

    async fn persist(&self) -> Result<String, PersistenceError> {
        let messages = to_chat_messages(&self.working);
        let persistence = &self.coordinator.persistence;
        let existing = self
            .request
            .chat_history_session_id
            .as_deref()
            .filter(|id| !id.is_empty());

        match existing {
            Some(id) => persistence
                .update_session_messages(id, messages)
                .await?
                .map(|session| session.id)
                .ok_or_else(|| PersistenceError::SessionNotFound(id.to_string())),
            None => {
                let source = self
                    .request
                    .source
                    .as_deref()
                    .unwrap_or(DEFAULT_SESSION_SOURCE);
                let session = persistence
                    .create_session(self.owner_id(), messages, source)
                    .await?;
                Ok(session.id)
            }
        }
    }

    fn stopped(&mut self, conversation: &mut dyn EngineConversation) -> ExchangeOutcome {
        info!("exchange stopped on request");
        self.cancel.cancel();
        conversation.abort();
        self.emit(
            StreamEvent::End {
                finish_reason: FinishReason::Stop,
                can_continue: false,
            },
            None,
        );
        self.enter(ExchangeState::Stopped);
        self.release();
        ExchangeOutcome::Stopped
    }

    fn fail(&mut self, message: String) -> ExchangeOutcome {
        warn!(error = %message, "exchange failed");
        self.cancel.cancel();
        self.emit(
            StreamEvent::Error {
                message: message.clone(),
            },
            Some(NotificationType::Error),
        );
        self.enter(ExchangeState::Errored);
        self.release();
        ExchangeOutcome::Errored(message)
    }
}
