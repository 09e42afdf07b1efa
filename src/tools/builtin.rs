//! Built-in control tools.
//!
//! `finish` ends a session with a final answer and `ask_user` suspends it until
//! the user replies. Both are constructed via [`AgentTool::new`] and returned
//! as `Arc<dyn Tool>`.

use std::sync::Arc;

use crate::tools::tool::{AgentTool, Tool, ToolOutput};
use crate::tools::types::AgentToolParameters;

pub const FINISH_TOOL: &str = "finish";
pub const ASK_USER_TOOL: &str = "ask_user";

/// Create the `finish` tool; its `result` argument becomes the final response.
pub fn finish_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        FINISH_TOOL,
        "Call when the task is complete. The result is shown to the user as the final answer.",
        AgentToolParameters::object()
            .string("result", "Final answer or summary of the work done", true)
            .build(),
        |args, _ctx| async move { Ok(ToolOutput::finish(args.get_str("result")?)) },
    ))
}

/// Create the `ask_user` tool; its `question` is shown to the user.
pub fn ask_user_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        ASK_USER_TOOL,
        "Ask the user a question and wait for the reply before continuing.",
        AgentToolParameters::object()
            .string("question", "Question for the user", true)
            .build(),
        |args, _ctx| async move { Ok(ToolOutput::ask_user(args.get_str("question")?)) },
    ))
}

/// Both control tools.
pub fn control_tools() -> Vec<Arc<dyn Tool>> {
    vec![finish_tool(), ask_user_tool()]
}
