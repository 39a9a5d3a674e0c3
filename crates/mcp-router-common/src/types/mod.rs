mod agent;
mod chat;
mod log;
mod pagination;
mod server;
mod session;
mod settings;
mod stream;
mod workspace;

pub use agent::*;
pub use chat::*;
pub use log::*;
pub use pagination::*;
pub use server::*;
pub use session::*;
pub use settings::*;
pub use stream::*;
pub use workspace::*;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
