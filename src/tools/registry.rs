//! Name-keyed tool registry and the executor seam used by the session loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use crate::provider::ToolDefinition;
use crate::types::ToolResult;

/// Executes tool calls by name.
///
/// `execute` never fails: errors raised by a tool, and unknown tool names,
/// come back as a failing [`ToolResult`].
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Schemas advertised to the model.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Whether interrupted calls to `tool_name` may be replayed.
    fn is_resumable(&self, tool_name: &str) -> bool;

    async fn execute(&self, call_id: &str, tool_name: &str, args: ToolArguments) -> ToolResult;
}

/// Default [`ToolExecutor`] over a set of registered tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Builder-style registration.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().schema.clone(),
            })
            .collect()
    }

    fn is_resumable(&self, tool_name: &str) -> bool {
        self.tools
            .get(tool_name)
            .map(|tool| tool.resumable())
            .unwrap_or(true)
    }

    async fn execute(&self, call_id: &str, tool_name: &str, args: ToolArguments) -> ToolResult {
        let Some(tool) = self.tools.get(tool_name) else {
            return ToolResult::failure(call_id, format!("tool not found: {tool_name}"));
        };
        let ctx = ToolExecutionContext {
            call_id: call_id.to_string(),
            metadata: serde_json::Value::Null,
        };
        let started = Instant::now();
        let outcome = tool.execute(&args, &ctx).await;
        let elapsed = started.elapsed();
        match outcome {
            Ok(output) => {
                let result = ToolResult::success(call_id, output.content).with_duration(elapsed);
                match output.signal {
                    Some(signal) => result.with_signal(signal),
                    None => result,
                }
            }
            Err(err) => ToolResult::failure(call_id, err.to_string()).with_duration(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConductorError;
    use crate::tools::tool::{AgentTool, ToolOutput};
    use crate::tools::types::AgentToolParameters;
    use crate::types::ControlSignal;

    fn echo() -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            "echo",
            "Echo the text argument",
            AgentToolParameters::object()
                .string("text", "Text to echo", true)
                .build(),
            |args, _ctx| async move { Ok(ToolOutput::text(args.get_str("text")?)) },
        ))
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failing_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("c1", "nope", ToolArguments::empty()).await;
        assert!(!result.ok);
        assert_eq!(result.call_id, "c1");
        assert_eq!(result.content, "tool not found: nope");
    }

    #[tokio::test]
    async fn tool_errors_become_failing_results() {
        let registry = ToolRegistry::new().with_tool(echo());
        let result = registry.execute("c1", "echo", ToolArguments::empty()).await;
        assert!(!result.ok);
        assert!(result.content.contains("Missing string argument: text"));
    }

    #[tokio::test]
    async fn signals_are_carried_onto_the_result() {
        let done: Arc<dyn Tool> = Arc::new(AgentTool::new(
            "done",
            "",
            AgentToolParameters::empty(),
            |_args, _ctx| async move { Ok::<_, ConductorError>(ToolOutput::finish("all done")) },
        ));
        let registry = ToolRegistry::new().with_tool(done);
        let result = registry.execute("c9", "done", ToolArguments::empty()).await;
        assert!(result.ok);
        assert_eq!(result.signal, Some(ControlSignal::Finish));
        assert_eq!(result.content, "all done");
    }

    #[test]
    fn definitions_keep_registration_order_and_resumability() {
        let nested: Arc<dyn Tool> = Arc::new(
            AgentTool::new(
                "delegate",
                "",
                AgentToolParameters::empty(),
                |_args: ToolArguments, _ctx: ToolExecutionContext| async move {
                    Ok::<_, ConductorError>(ToolOutput::text(""))
                },
            )
            .non_resumable(),
        );
        let registry = ToolRegistry::new().with_tool(echo()).with_tool(nested);
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "delegate"]);
        assert!(registry.is_resumable("echo"));
        assert!(!registry.is_resumable("delegate"));
    }
}
