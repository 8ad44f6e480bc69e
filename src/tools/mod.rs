//! Tools the agent may invoke mid-conversation

mod builtin;
mod executor;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use builtin::{ClockTool, WeatherTool};
pub use executor::{ToolCompletion, ToolExecutor};

use crate::config::ToolDeclaration;
use crate::Result;

/// An executable tool exposed to the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to invoke this tool
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON schema for the arguments object
    fn parameters(&self) -> Value;

    /// Execute the tool and return a serialized result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tool` on failure; the executor reports it as an
    /// error payload, it never reaches the event dispatch loop.
    async fn invoke(&self, args: Value) -> Result<String>;
}

/// Fixed registry of tools, looked up by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the builtin tools registered
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClockTool));
        registry.register(Arc::new(WeatherTool::new()));
        registry
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Wire declarations for the named tools; unknown names are
    /// skipped with a warning.
    #[must_use]
    pub fn declarations(&self, enabled: &[String]) -> Vec<ToolDeclaration> {
        enabled
            .iter()
            .filter_map(|name| {
                let Some(tool) = self.tools.get(name) else {
                    tracing::warn!(tool = %name, "enabled tool not in registry");
                    return None;
                };
                Some(ToolDeclaration {
                    kind: "function".to_string(),
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.get("get_time").is_some());
        assert!(registry.get("get_weather").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn declarations_skip_unknown_names() {
        let registry = ToolRegistry::with_builtins();
        let decls = registry.declarations(&[
            "get_time".to_string(),
            "not_a_tool".to_string(),
        ]);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "get_time");
        assert_eq!(decls[0].kind, "function");
    }
}
