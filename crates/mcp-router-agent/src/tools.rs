//! Tool execution seam.
//!
//! The coordinator only sees `ToolExecutor`. The platform layer routes
//! calls to MCP servers; `ToolRegistry` holds in-process handlers.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::ToolError;

/// Result of a tool call that reached its tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    /// The tool ran and reported a failure.
    Failure(String),
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        agent_id: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<ToolOutcome, ToolError>;
}

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.handlers
            .insert(name.into(), Arc::new(move |args| Box::pin(handler(args))));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        _agent_id: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<ToolOutcome, ToolError> {
        let handler = self
            .handlers
            .get(tool_name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        Ok(match handler(arguments.clone()).await {
            Ok(value) => ToolOutcome::Success(value),
            Err(message) => ToolOutcome::Failure(message),
        })
    }
}
