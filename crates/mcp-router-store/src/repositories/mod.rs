pub mod agent;
pub mod request_log;
pub mod server;
pub mod session;
pub mod settings;
pub mod workspace;

pub use agent::AgentRepository;
pub use request_log::RequestLogRepository;
pub use server::ServerRepository;
pub use session::SessionRepository;
pub use settings::SettingsRepository;
pub use workspace::WorkspaceRepository;
