//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    AgentState, CostGovernor, ExitReason, SessionLoop, SessionOutcome, SessionRegistry,
    SessionRequest,
};
pub use crate::config::ConductorConfig;
pub use crate::conversation::{InMemoryTurnLog, TurnLog};
pub use crate::error::{ConductorError, Result};
pub use crate::provider::ModelProvider;
pub use crate::tools::{
    AgentTool, AgentToolParameters, Tool, ToolArguments, ToolOutput, ToolRegistry,
};
pub use crate::types::{ControlSignal, ToolCall, ToolResult, Turn, Usage};
