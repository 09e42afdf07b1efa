//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::{ParsedArguments, ToolArguments};
pub use registry::{ToolExecutor, ToolRegistry};
pub use tool::{AgentTool, Tool, ToolExecutionContext, ToolOutput};
pub use types::AgentToolParameters;
