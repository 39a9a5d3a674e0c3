//! HTTP completion engine.
//!
//! POSTs the running transcript to the completion endpoint and reads the
//! line-oriented data stream back. A step that ends in `tool-calls` with
//! every invocation resolved is resubmitted automatically, up to
//! `max_steps` requests per appended message.

use async_trait::async_trait;
use futures_util::StreamExt;
use mcp_router_common::{
    new_id, FinishReason, MessagePart, ToolCall, ToolInvocation, ToolInvocationState, UiMessage,
    UiRole,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::data_stream::{parse_line, response_lines, LineStream, StreamPart};
use super::{
    CompletionEngine, EngineConversation, EngineEvent, EngineRequest, ToolDescriptor,
    ToolResultSubmission,
};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    pub api_url: String,
    pub connect_timeout: Duration,
    pub max_steps: u32,
}

/// Completion engine backed by a streaming HTTP endpoint.
pub struct HttpEngine {
    config: HttpEngineConfig,
    http: reqwest::Client,
}

impl HttpEngine {
    pub fn new(config: HttpEngineConfig) -> Result<Self, EngineError> {
        // No total timeout: responses stream for as long as the model talks.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| EngineError::NetworkError(e.to_string()))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl CompletionEngine for HttpEngine {
    async fn connect(
        &self,
        request: EngineRequest,
    ) -> Result<Box<dyn EngineConversation>, EngineError> {
        debug!(
            agent_id = %request.agent_id,
            tools = request.tools.len(),
            messages = request.initial_messages.len(),
            "opening completion conversation"
        );
        Ok(Box::new(HttpConversation {
            http: self.http.clone(),
            url: self.config.api_url.clone(),
            agent_id: request.agent_id,
            tools: request.tools,
            auth_token: request.auth_token,
            cancel: request.cancel,
            max_steps: self.config.max_steps.max(1),
            steps: 0,
            state: StreamState::new(request.initial_messages),
            lines: None,
            finished: false,
        }))
    }
}

/// Transcript being built from stream parts, plus the events it produced.
#[derive(Debug, Default)]
struct StreamState {
    messages: Vec<UiMessage>,
    assistant: Option<usize>,
    finish: Option<FinishReason>,
    pending: VecDeque<EngineEvent>,
    errored: bool,
}

impl StreamState {
    fn new(messages: Vec<UiMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    fn snapshot(&mut self) {
        self.pending
            .push_back(EngineEvent::Messages(self.messages.clone()));
    }

    fn push_user(&mut self, message: UiMessage) {
        self.messages.push(message);
        self.assistant = None;
        self.finish = None;
        self.errored = false;
        self.snapshot();
    }

    fn assistant_mut(&mut self, message_id: Option<String>) -> &mut UiMessage {
        let index = match self.assistant {
            Some(index) => index,
            None => {
                let id = message_id.unwrap_or_else(new_id);
                self.messages.push(UiMessage::new(id, UiRole::Assistant, ""));
                let index = self.messages.len() - 1;
                self.assistant = Some(index);
                index
            }
        };
        &mut self.messages[index]
    }

    fn invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        let index = self.assistant?;
        self.messages[index]
            .parts
            .iter_mut()
            .find_map(|part| match part {
                MessagePart::ToolInvocation { tool_invocation }
                    if tool_invocation.tool_call_id == tool_call_id =>
                {
                    Some(tool_invocation)
                }
                _ => None,
            })
    }

    fn apply(&mut self, part: StreamPart) {
        match part {
            StreamPart::StartStep { message_id } => {
                self.assistant_mut(message_id);
            }
            StreamPart::Text(text) => {
                let message = self.assistant_mut(None);
                message.content.push_str(&text);
                match message.parts.last_mut() {
                    Some(MessagePart::Text { text: last }) => last.push_str(&text),
                    _ => message.parts.push(MessagePart::Text { text }),
                }
                self.snapshot();
            }
            StreamPart::ToolCallStreamingStart {
                tool_call_id,
                tool_name,
            } => {
                self.assistant_mut(None)
                    .parts
                    .push(MessagePart::ToolInvocation {
                        tool_invocation: ToolInvocation {
                            state: ToolInvocationState::PartialCall,
                            tool_call_id,
                            tool_name,
                            args: Value::Null,
                            result: None,
                        },
                    });
                self.snapshot();
            }
            StreamPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.assistant_mut(None);
                match self.invocation_mut(&tool_call_id) {
                    Some(existing) => {
                        existing.state = ToolInvocationState::Call;
                        existing.tool_name = tool_name.clone();
                        existing.args = args.clone();
                    }
                    None => self
                        .assistant_mut(None)
                        .parts
                        .push(MessagePart::ToolInvocation {
                            tool_invocation: ToolInvocation {
                                state: ToolInvocationState::Call,
                                tool_call_id: tool_call_id.clone(),
                                tool_name: tool_name.clone(),
                                args: args.clone(),
                                result: None,
                            },
                        }),
                }
                self.snapshot();
                self.pending.push_back(EngineEvent::ToolCall(ToolCall {
                    id: tool_call_id,
                    name: tool_name,
                    arguments: args,
                }));
            }
            StreamPart::ToolResult {
                tool_call_id,
                result,
            } => {
                if self.set_tool_result(&tool_call_id, result) {
                    self.snapshot();
                } else {
                    warn!(tool_call_id, "result for unknown tool call");
                }
            }
            StreamPart::FinishStep { finish_reason, .. }
            | StreamPart::FinishMessage { finish_reason } => {
                self.finish = Some(finish_reason);
            }
            StreamPart::Error(message) => {
                self.errored = true;
                self.pending.push_back(EngineEvent::Error(message));
            }
        }
    }

    fn set_tool_result(&mut self, tool_call_id: &str, result: Value) -> bool {
        match self.invocation_mut(tool_call_id) {
            Some(invocation) => {
                invocation.state = ToolInvocationState::Result;
                invocation.result = Some(result);
                true
            }
            None => false,
        }
    }

    /// The current step called tools and every call has a result.
    fn tools_resolved(&self) -> bool {
        let Some(index) = self.assistant else {
            return false;
        };
        let mut invocations = self.messages[index].tool_invocations().peekable();
        invocations.peek().is_some() && invocations.all(|t| t.result.is_some())
    }
}

pub struct HttpConversation {
    http: reqwest::Client,
    url: String,
    agent_id: String,
    tools: Vec<ToolDescriptor>,
    auth_token: Option<String>,
    cancel: CancellationToken,
    max_steps: u32,
    steps: u32,
    state: StreamState,
    lines: Option<LineStream>,
    finished: bool,
}

impl HttpConversation {
    async fn submit(&mut self) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "agentId": self.agent_id,
            "tools": self.tools,
            "messages": self.state.messages,
        });
        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(EngineError::Aborted),
            response = request.send() => {
                response.map_err(|e| EngineError::NetworkError(e.to_string()))?
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(EngineError::ApiError(format!("HTTP {status}: {text}")));
        }

        self.steps += 1;
        debug!(agent_id = %self.agent_id, step = self.steps, "completion step started");
        self.lines = Some(response_lines(response));
        Ok(())
    }

    async fn complete_step(&mut self) {
        let reason = self.state.finish.take().unwrap_or(FinishReason::Unknown);
        if reason == FinishReason::ToolCalls
            && self.state.tools_resolved()
            && self.steps < self.max_steps
        {
            if let Err(e) = self.submit().await {
                self.finished = true;
                self.state.pending.push_back(EngineEvent::Error(e.to_string()));
            }
            return;
        }
        self.finished = true;
        self.state.pending.push_back(EngineEvent::Finish(reason));
    }
}

#[async_trait]
impl EngineConversation for HttpConversation {
    async fn append(&mut self, message: UiMessage) -> Result<(), EngineError> {
        self.state.push_user(message);
        self.steps = 0;
        self.finished = false;
        self.submit().await
    }

    async fn add_tool_result(
        &mut self,
        submission: ToolResultSubmission,
    ) -> Result<(), EngineError> {
        if !self
            .state
            .set_tool_result(&submission.tool_call_id, submission.result)
        {
            return Err(EngineError::UnknownToolCall(submission.tool_call_id));
        }
        self.state.snapshot();
        Ok(())
    }

    fn abort(&mut self) {
        self.cancel.cancel();
        self.lines = None;
        self.finished = true;
        self.state.pending.clear();
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        loop {
            if let Some(event) = self.state.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            let mut lines = self.lines.take()?;
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.finished = true;
                    return None;
                }
                line = lines.next() => line,
            };
            match line {
                Some(Ok(line)) => {
                    match parse_line(&line) {
                        Ok(Some(part)) => self.state.apply(part),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "skipping malformed stream part"),
                    }
                    if self.state.errored {
                        self.finished = true;
                    } else {
                        self.lines = Some(lines);
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(EngineEvent::Error(format!("stream read failed: {e}")));
                }
                None => self.complete_step().await,
            }
        }
    }
}
