use async_trait::async_trait;
use mcp_router_common::{ChatMessage, Session, SessionStatus};
use mcp_router_store::{SessionRepository, StoreContext};
use tokio::task;

use crate::error::PersistenceError;
use crate::sinks::PersistenceSink;

/// rusqlite blocks on the connection lock and on `busy_timeout`, so every
/// call runs on the blocking pool.
#[async_trait]
impl PersistenceSink for SessionRepository {
    async fn create_session(
        &self,
        agent_id: &str,
        messages: Vec<ChatMessage>,
        source: &str,
    ) -> Result<Session, PersistenceError> {
        let repo = self.clone();
        let agent_id = agent_id.to_string();
        let source = source.to_string();
        let session = task::spawn_blocking(move || {
            repo.create_session(&agent_id, messages, &source, SessionStatus::Completed)
        })
        .await??;
        Ok(session)
    }

    async fn update_session_messages(
        &self,
        session_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<Option<Session>, PersistenceError> {
        let repo = self.clone();
        let session_id = session_id.to_string();
        let session =
            task::spawn_blocking(move || repo.update_session_messages(&session_id, messages))
                .await??;
        Ok(session)
    }
}

/// Resolves the repository per call so a workspace switch takes effect for
/// the next save.
#[async_trait]
impl PersistenceSink for StoreContext {
    async fn create_session(
        &self,
        agent_id: &str,
        messages: Vec<ChatMessage>,
        source: &str,
    ) -> Result<Session, PersistenceError> {
        let sessions = self.sessions()?;
        PersistenceSink::create_session(&sessions, agent_id, messages, source).await
    }

    async fn update_session_messages(
        &self,
        session_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<Option<Session>, PersistenceError> {
        let sessions = self.sessions()?;
        PersistenceSink::update_session_messages(&sessions, session_id, messages).await
    }
}
