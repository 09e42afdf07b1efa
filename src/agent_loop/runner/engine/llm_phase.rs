use tracing::warn;

use crate::conversation::TurnLog;
use crate::provider::{format::turns_to_wire, ProviderRequest};
use crate::types::{ToolCall, Turn};

use super::super::super::events::AgentEvent;
use super::super::super::session::Session;
use super::super::control::debug_enabled;
use super::super::tooling::admit_tool_calls;
use super::{IterationContext, IterationError};

pub(super) enum LlmPhaseOutcome {
    ToolCalls(Vec<ToolCall>),
    /// `text` is `None` when the model returned nothing at all.
    NoToolCalls { text: Option<String> },
}

/// Check the budget, call the model, and append its reply.
pub(super) async fn run_llm_phase<L>(
    ctx: &IterationContext<'_>,
    session: &Session,
    log: &mut L,
    iteration: usize,
) -> Result<LlmPhaseOutcome, IterationError>
where
    L: TurnLog + Send + ?Sized,
{
    let runner = ctx.runner;
    runner.budget.check_total_cost_limit(session.user_id())?;

    let request = ProviderRequest {
        messages: turns_to_wire(log.turns()),
        tools: runner.tools.definitions(),
        stop_sequences: runner.config.session.stop_sequences.clone(),
    };
    ctx.emitter.emit(AgentEvent::BeforeModelCall {
        iteration,
        turns: log.len(),
    });
    if debug_enabled() {
        tracing::debug!(
            session = %session.identity(),
            iteration,
            provider = runner.provider.provider_name(),
            model = runner.provider.model_id(),
            tools = request.tools.len(),
            "model call"
        );
    }

    let response = runner.provider.complete(&request).await?;
    session.touch();
    let charged = runner.budget.record_usage(session.user_id(), &response.usage);

    let mut reply = response.normalize();
    if reply.was_empty {
        warn!(session = %session.identity(), iteration, "model returned an empty response");
        ctx.emitter.emit(AgentEvent::EmptyModelResponse { iteration });
    }
    reply.tool_calls = admit_tool_calls(reply.tool_calls, ctx.limits.allow_multiple_calls);

    ctx.emitter.emit(AgentEvent::AfterModelCall {
        iteration,
        usage: reply.usage,
        tool_calls: reply.tool_calls.len(),
    });
    if debug_enabled() {
        tracing::debug!(
            session = %session.identity(),
            iteration,
            tool_calls = reply.tool_calls.len(),
            spend_micros = charged,
            "model reply"
        );
    }

    log.append(Turn::assistant_with_calls(
        reply.content.clone(),
        reply.tool_calls.clone(),
    ));

    if reply.tool_calls.is_empty() {
        let text = if reply.was_empty { None } else { reply.content };
        Ok(LlmPhaseOutcome::NoToolCalls { text })
    } else {
        Ok(LlmPhaseOutcome::ToolCalls(reply.tool_calls))
    }
}
