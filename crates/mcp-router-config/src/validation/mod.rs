//! Full configuration validation.
//!
//! Every section validator pushes into one error list; the orchestrator
//! folds the list into a single `ConfigError`.

mod helpers;


use crate::schema::RouterConfig;
use mcp_router_common::ConfigError;

use helpers::{validate_http_url, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RouterConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_database(&mut errors, config);
    validate_engine(&mut errors, config);
    validate_tools(&mut errors, config);
    validate_sessions(&mut errors, config);
    validate_remote(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_database(errors: &mut Vec<String>, config: &RouterConfig) {
    validate_range(
        errors,
        "database.busy_timeout_ms",
        config.database.busy_timeout_ms,
        0,
        60_000,
    );
    if let Some(path) = &config.database.path {
        if path.trim().is_empty() {
            errors.push("database.path must not be blank when set".into());
        }
    }
}

fn validate_engine(errors: &mut Vec<String>, config: &RouterConfig) {
    validate_http_url(errors, "engine.api_url", &config.engine.api_url);
    validate_range(
        errors,
        "engine.response_timeout_secs",
        config.engine.response_timeout_secs,
        5,
        3600,
    );
    validate_range(
        errors,
        "engine.connect_timeout_secs",
        config.engine.connect_timeout_secs,
        1,
        120,
    );
    validate_range(errors, "engine.max_steps", config.engine.max_steps, 1, 50);
}

fn validate_tools(errors: &mut Vec<String>, config: &RouterConfig) {
    validate_range(
        errors,
        "tools.execution_timeout_secs",
        config.tools.execution_timeout_secs,
        1,
        3600,
    );
}

fn validate_sessions(errors: &mut Vec<String>, config: &RouterConfig) {
    validate_range(
        errors,
        "sessions.max_sessions_per_agent",
        config.sessions.max_sessions_per_agent,
        1,
        100_000,
    );
    validate_range(errors, "sessions.page_size", config.sessions.page_size, 1, 500);
}

fn validate_remote(errors: &mut Vec<String>, config: &RouterConfig) {
    validate_range(
        errors,
        "remote.request_timeout_secs",
        config.remote.request_timeout_secs,
        1,
        300,
    );
}
