use crate::conversation::TurnLog;
use crate::types::{ControlSignal, ToolCall, Turn};

use super::super::super::session::Session;
use super::super::super::types::ExitReason;
use super::super::tooling::{execute_parallel_tool_calls, execute_sequential_tool_calls};
use super::{IterationContext, IterationStep};

/// Execute `calls`, append one tool turn per result in call order, then act
/// on the first control signal.
///
/// In parallel mode every batch, including a single admitted call, runs under
/// the batch timeout.
pub(super) async fn run_tool_phase<L>(
    ctx: &IterationContext<'_>,
    session: &Session,
    log: &mut L,
    calls: &[ToolCall],
) -> IterationStep
where
    L: TurnLog + Send + ?Sized,
{
    let tools = &ctx.runner.tools;
    let results = if ctx.limits.parallel_tools {
        execute_parallel_tool_calls(tools, calls, ctx.limits.batch_timeout, ctx.emitter).await
    } else {
        execute_sequential_tool_calls(tools.as_ref(), calls, ctx.emitter).await
    };
    session.touch();

    for (call, result) in calls.iter().zip(&results) {
        log.append(Turn::tool_result(call, result));
    }

    results
        .into_iter()
        .find_map(|result| {
            let reason = match result.signal? {
                ControlSignal::Finish => ExitReason::Finished,
                ControlSignal::AskUser => ExitReason::AwaitingUser,
            };
            Some(IterationStep::Exit {
                reason,
                response: result.content,
            })
        })
        .unwrap_or(IterationStep::Continue)
}
