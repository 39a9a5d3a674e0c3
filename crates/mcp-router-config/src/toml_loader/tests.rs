//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_mcp_router_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, mcp_router_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[engine]
api_url = "http://localhost:3000/api/agent/chat/use"

[sessions]
page_size = 25
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.engine.api_url, "http://localhost:3000/api/agent/chat/use");
    assert_eq!(config.sessions.page_size, 25);
    // Defaults preserved
    assert_eq!(config.engine.max_steps, 5);
    assert_eq!(config.tools.execution_timeout_secs, 60);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, mcp_router_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_keeps_parsed_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[engine]
max_steps = 0
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.engine.max_steps, 0);
}

#[test]
fn load_or_create_writes_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mcp-router").join("config.toml");

    let config = load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.engine.response_timeout_secs, 120);

    let reloaded = load_from_path(&path).unwrap();
    assert_eq!(reloaded.sessions.max_sessions_per_agent, 100);
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::RouterConfig;

    let config: RouterConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("mcp-router"));
        assert!(path_str.ends_with("config.toml"));
    }
}
