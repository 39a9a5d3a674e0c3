//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# MCP Router Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[database]
# path = ""                 # empty = <data dir>/mcp-router/mcprouter.db
# busy_timeout_ms = 5000    # 0-60000

[engine]
# api_url = "https://mcp-router.net/api/agent/chat/use"
# response_timeout_secs = 120   # 5-3600, wait for the next engine event
# connect_timeout_secs = 10     # 1-120
# max_steps = 5                 # 1-50, tool round-trips per exchange

[tools]
# execution_timeout_secs = 60   # 1-3600

[sessions]
# max_sessions_per_agent = 100  # kept by `mcp-router cleanup`
# cleanup_on_startup = false
# page_size = 10                # 1-500

[remote]
# request_timeout_secs = 30     # 1-300

[logging]
# level = "info"            # trace, debug, info, warn, error
# json = false
"##
    .to_string()
}
