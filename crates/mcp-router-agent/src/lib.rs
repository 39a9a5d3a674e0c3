//! Background chat sessions for MCP Router.
//!
//! `SessionCoordinator` drives one exchange per session key against a
//! `CompletionEngine`, forwarding progress through a `TransportSink`,
//! executing tools through a `ToolExecutor` and saving transcripts through
//! a `PersistenceSink`.

pub mod coordinator;
pub mod engine;
pub mod error;
mod persistence;
pub mod sinks;
pub mod tools;

pub use coordinator::{CoordinatorSettings, ExchangeOutcome, ExchangeRequest, SessionCoordinator};
pub use engine::{
    CompletionEngine, EngineConversation, EngineEvent, EngineRequest, HttpEngine,
    HttpEngineConfig, ToolDescriptor, ToolResultSubmission,
};
pub use error::{CoordinatorError, EngineError, PersistenceError, ToolError};
pub use sinks::{BusTransport, PersistenceSink, StopSubscription, TransportSink};
pub use tools::{ToolExecutor, ToolOutcome, ToolRegistry};
