use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Tool, ToolError, ToolExecutor};

/// Name-to-implementation mapping behind the executor capability set.
/// `refresh` swaps the whole mapping atomically, so a session observing the
/// registry mid-swap sees either the old set or the new one, never a mix.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let registry = Self::new();
        registry.refresh(tools);
        registry
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut map = self.tools.write().unwrap_or_else(|e| e.into_inner());
        map.insert(tool.name().to_string(), tool);
    }

    /// Replace the full tool set in one swap.
    pub fn refresh(&self, tools: Vec<Arc<dyn Tool>>) {
        let next: HashMap<String, Arc<dyn Tool>> = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        let mut map = self.tools.write().unwrap_or_else(|e| e.into_inner());
        *map = next;
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let map = self.tools.read().unwrap_or_else(|e| e.into_inner());
        map.get(name).cloned()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn supported_tools(&self) -> Vec<String> {
        let map = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    fn tool_schema(&self, name: &str) -> Option<Value> {
        self.get(name).map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "input_schema": tool.input_schema(),
            })
        })
    }

    async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        // Clone the handle out so the lock is not held across the call.
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(input).await
    }
}
