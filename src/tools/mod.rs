pub mod builtin;
pub mod registry;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    Failed(String),
}

/// One capability. Implementations are selected at composition time and
/// registered with a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn call(&self, input: Value) -> Result<Value, ToolError>;
}

/// Capability set the session depends on: list names, expose a schema per
/// name, execute asynchronously. Failures are data for the model, never
/// session faults.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn supported_tools(&self) -> Vec<String>;
    fn tool_schema(&self, name: &str) -> Option<Value>;
    async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError>;
}
