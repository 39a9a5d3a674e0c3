//! Where the coordinator sends its output.

use async_trait::async_trait;
use mcp_router_common::{ChatMessage, Event, EventBus, Session, StopRequest, StreamEnvelope};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::error::PersistenceError;

/// Delivers stream envelopes to the host and carries stop requests back.
pub trait TransportSink: Send + Sync {
    fn emit(&self, envelope: StreamEnvelope);

    /// Must be called before the exchange emits its start event so no stop
    /// request can slip between the two.
    fn subscribe_stop(&self) -> StopSubscription;
}

/// Stop requests as seen by one exchange. The receiver carries nothing
/// but stop requests, so stream traffic never makes it lag.
pub struct StopSubscription {
    rx: broadcast::Receiver<StopRequest>,
}

impl StopSubscription {
    pub fn new(rx: broadcast::Receiver<StopRequest>) -> Self {
        Self { rx }
    }

    /// Resolves on the first stop request addressed to `agent_id`. Never
    /// resolves once the channel is closed.
    pub async fn next_for(&mut self, agent_id: &str) {
        loop {
            match self.rx.recv().await {
                Ok(request) if request.agent_id == agent_id => return,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stop subscription lagged");
                }
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }
}

/// Transport over the in-process event bus.
#[derive(Clone)]
pub struct BusTransport {
    bus: Arc<EventBus>,
}

impl BusTransport {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl TransportSink for BusTransport {
    fn emit(&self, envelope: StreamEnvelope) {
        self.bus.publish(Event::Stream(envelope));
    }

    fn subscribe_stop(&self) -> StopSubscription {
        StopSubscription::new(self.bus.subscribe_stops())
    }
}

/// Session storage used when an exchange finishes.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn create_session(
        &self,
        agent_id: &str,
        messages: Vec<ChatMessage>,
        source: &str,
    ) -> Result<Session, PersistenceError>;

    /// `None` when no session has that id.
    async fn update_session_messages(
        &self,
        session_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<Option<Session>, PersistenceError>;
}
