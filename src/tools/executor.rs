//! Asynchronous tool execution
//!
//! Tool calls run on spawned tasks so they never block delivery of
//! inbound protocol events; completions flow back into the session
//! loop over a channel, where the pending-result ordering contract is
//! enforced.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::tools::ToolRegistry;

/// A finished tool call, ready to hand back to the protocol
#[derive(Debug, Clone)]
pub struct ToolCompletion {
    /// Call identifier assigned by the server
    pub call_id: String,

    /// Serialized result payload (an error object on failure)
    pub output: String,
}

/// Spawns tool executions and reports their completions
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    completions: mpsc::Sender<ToolCompletion>,
}

impl ToolExecutor {
    /// Create an executor delivering completions over `completions`
    pub fn new(registry: Arc<ToolRegistry>, completions: mpsc::Sender<ToolCompletion>) -> Self {
        Self {
            registry,
            completions,
        }
    }

    /// Start executing `name` with the given serialized arguments.
    ///
    /// Returns immediately; the result arrives on the completion
    /// channel. Lookup failures, argument parse failures, and tool
    /// errors are all serialized into the completion output, never
    /// raised.
    pub fn spawn(&self, call_id: String, name: String, arguments: &str) {
        let args: Value = serde_json::from_str(arguments).unwrap_or(Value::Object(
            serde_json::Map::new(),
        ));
        let tool = self.registry.get(&name);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let output = match tool {
                Some(tool) => match tool.invoke(args).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(tool = %name, error = %e, "tool execution failed");
                        serde_json::json!({ "error": e.to_string() }).to_string()
                    }
                },
                None => {
                    tracing::warn!(tool = %name, "unknown tool requested");
                    serde_json::json!({ "error": format!("unknown tool: {name}") }).to_string()
                }
            };

            tracing::debug!(tool = %name, call_id = %call_id, "tool finished");
            if completions
                .send(ToolCompletion { call_id, output })
                .await
                .is_err()
            {
                tracing::debug!(tool = %name, "session loop gone, completion dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echo args back"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, args: Value) -> crate::Result<String> {
            Ok(args.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _args: Value) -> crate::Result<String> {
            Err(crate::Error::Tool("boom".to_string()))
        }
    }

    fn executor_with(tools: Vec<Arc<dyn Tool>>) -> (ToolExecutor, mpsc::Receiver<ToolCompletion>) {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let (tx, rx) = mpsc::channel(4);
        (ToolExecutor::new(Arc::new(registry), tx), rx)
    }

    #[tokio::test]
    async fn completion_carries_tool_output() {
        let (executor, mut rx) = executor_with(vec![Arc::new(Echo)]);
        executor.spawn("call_1".to_string(), "echo".to_string(), r#"{"x":1}"#);

        let done = rx.recv().await.unwrap();
        assert_eq!(done.call_id, "call_1");
        assert_eq!(done.output, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn tool_error_becomes_error_payload() {
        let (executor, mut rx) = executor_with(vec![Arc::new(Failing)]);
        executor.spawn("call_2".to_string(), "failing".to_string(), "{}");

        let done = rx.recv().await.unwrap();
        let parsed: Value = serde_json::from_str(&done.output).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_payload() {
        let (executor, mut rx) = executor_with(vec![]);
        executor.spawn("call_3".to_string(), "nope".to_string(), "{}");

        let done = rx.recv().await.unwrap();
        let parsed: Value = serde_json::from_str(&done.output).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn malformed_arguments_default_to_empty_object() {
        let (executor, mut rx) = executor_with(vec![Arc::new(Echo)]);
        executor.spawn("call_4".to_string(), "echo".to_string(), "not json");

        let done = rx.recv().await.unwrap();
        assert_eq!(done.output, "{}");
    }
}
