//! Background session coordinator.
//!
//! Runs one exchange per session key: emits a start event, streams the
//! engine's output as chunk and tool events, executes tools when the agent
//! allows it, persists the transcript on a clean finish and releases the
//! key. Stop requests for the key's agent end the exchange early.

mod exchange;
mod guard;
mod tracker;
mod transcript;

#[cfg(test)]
mod tests;

use mcp_router_common::{new_correlation_id, AgentConfig, ChatMessage, FinishReason, SessionKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

use crate::engine::CompletionEngine;
use crate::error::CoordinatorError;
use crate::sinks::{PersistenceSink, TransportSink};
use crate::tools::ToolExecutor;

use exchange::Exchange;
use guard::{Admission, CompletionHook, KeyRegistry};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Longest wait for the next engine event.
    pub response_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

/// What the host hands over to start an exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub session_key: SessionKey,
    pub agent: AgentConfig,
    /// Agent id as the host knows it. Stop requests are matched against it.
    pub agent_id: String,
    pub query: String,
    pub auth_token: Option<String>,
    pub history: Vec<ChatMessage>,
    pub chat_history_session_id: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// The engine finished. `session_id` is set when the transcript was saved.
    Completed {
        finish_reason: FinishReason,
        session_id: Option<String>,
    },
    Stopped,
    Errored(String),
    /// Same query already running or just finished on this key.
    Ignored,
}

pub struct SessionCoordinator {
    engine: Arc<dyn CompletionEngine>,
    transport: Arc<dyn TransportSink>,
    persistence: Arc<dyn PersistenceSink>,
    tools: Arc<dyn ToolExecutor>,
    settings: CoordinatorSettings,
    registry: Arc<KeyRegistry>,
    on_complete: Option<CompletionHook>,
}

impl SessionCoordinator {
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        transport: Arc<dyn TransportSink>,
        persistence: Arc<dyn PersistenceSink>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            engine,
            transport,
            persistence,
            tools,
            settings: CoordinatorSettings::default(),
            registry: Arc::new(KeyRegistry::default()),
            on_complete: None,
        }
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Called once per exchange after its key is released.
    pub fn with_completion_hook(
        mut self,
        hook: impl Fn(&SessionKey) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    pub fn is_live(&self, key: &SessionKey) -> bool {
        self.registry.is_live(key)
    }

    pub fn live_sessions(&self) -> usize {
        self.registry.live_count()
    }

    /// Run one exchange to completion.
    ///
    /// Returns `Ignored` when the same query is already running or just
    /// finished on this key, and `SessionBusy` when a different query is
    /// still running on it.
    pub async fn run(&self, request: ExchangeRequest) -> Result<ExchangeOutcome, CoordinatorError> {
        if request.query.trim().is_empty() {
            return Err(CoordinatorError::EmptyQuery);
        }

        let guard = match self.registry.admit(
            &request.session_key,
            request.query.trim(),
            self.on_complete.clone(),
        )? {
            Admission::Admitted(guard) => guard,
            Admission::Duplicate => {
                debug!(session_key = %request.session_key, "duplicate query ignored");
                return Ok(ExchangeOutcome::Ignored);
            }
        };

        let span = tracing::info_span!(
            "exchange",
            session_key = %request.session_key,
            agent_id = %request.agent_id,
            correlation_id = %new_correlation_id(),
        );
        Ok(Exchange::new(self, request, guard)
            .drive()
            .instrument(span)
            .await)
    }
}
