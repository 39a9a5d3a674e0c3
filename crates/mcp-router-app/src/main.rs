mod boot;
mod cli;
mod commands;

use mcp_router_config::schema::LoggingConfig;
use mcp_router_config::RouterConfig;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::boot::Runtime;

/// `--log-level` wins over `RUST_LOG`, which wins over `[logging] level`.
fn env_filter(flag: Option<&str>, logging: &LoggingConfig) -> EnvFilter {
    let fallback = || EnvFilter::new(logging.level.as_directive());
    match flag {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
    }
}

fn init_logging(flag: Option<&str>, logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(flag, logging))
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let loaded = mcp_router_config::load_config(args.config.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => RouterConfig::default(),
    };
    init_logging(args.log_level.as_deref(), &config.logging);
    if let Err(e) = &loaded {
        warn!(error = %e, "failed to load config, using defaults");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "mcp-router starting");

    let mut runtime = match Runtime::boot(config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match commands::run(&mut runtime, args.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };
    runtime.shutdown().await;
    code
}
