//! Shared vocabulary for the MCP Router workspace.
//!
//! Chat, session, agent, server and workspace types, the error enums that
//! cross crate boundaries, id helpers, and the event bus that carries stream
//! envelopes between the session coordinator and its host.

pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, RouterError};
pub use events::{Event, EventBus};
pub use id::{new_correlation_id, new_id, SessionKey};
pub use types::*;

pub type Result<T> = std::result::Result<T, RouterError>;
