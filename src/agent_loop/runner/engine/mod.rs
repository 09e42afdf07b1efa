use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::conversation::TurnLog;
use crate::error::ConductorError;
use crate::types::{ToolCall, Turn};

use super::super::budget::{CostLimitExceeded, COST_LIMIT_MESSAGE};
use super::super::events::AgentEvent;
use super::super::registry::RegistrationGuard;
use super::super::resume;
use super::super::retry::{
    failure_notice, interrupted_call_notice, RetryDecision, RetryGovernor, RetryPolicy,
};
use super::super::session::Session;
use super::super::types::{AgentState, ExitReason, SessionOutcome};
use super::control::{debug_enabled, SessionEventEmitter};
use super::limits::RunnerLimits;
use super::SessionLoop;

mod llm_phase;
mod tool_phase;

use llm_phase::{run_llm_phase, LlmPhaseOutcome};
use tool_phase::run_tool_phase;

const NO_TOOL_CALL_NUDGE: &str = "You replied without calling a tool. Keep working on the task \
     with the available tools, or call `finish` with your final answer if the task is complete.";

/// Result of one successful iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationStep {
    Continue,
    Exit { reason: ExitReason, response: String },
}

/// Failure of one iteration, as seen by the retry driver.
#[derive(Debug, Error)]
pub enum IterationError {
    /// Retried with backoff.
    #[error(transparent)]
    Recoverable(#[from] ConductorError),
    /// Ends the session without retry.
    #[error(transparent)]
    CostLimit(#[from] CostLimitExceeded),
}

pub(super) struct IterationContext<'a> {
    pub(super) runner: &'a SessionLoop,
    pub(super) limits: RunnerLimits,
    pub(super) emitter: &'a SessionEventEmitter,
}

/// Consecutive model replies without tool calls.
#[derive(Debug, Default)]
pub(super) struct NoToolCallStreak {
    count: usize,
}

impl NoToolCallStreak {
    fn reset(&mut self) {
        self.count = 0;
    }

    fn bump(&mut self) -> usize {
        self.count += 1;
        self.count
    }
}

fn closing_message(limit: usize) -> String {
    format!(
        "Stopping: the assistant replied {limit} times in a row without using a tool. \
         Reply to continue."
    )
}

fn max_iterations_message(limit: usize) -> String {
    format!("Stopped after reaching the maximum of {limit} iterations. Reply to continue.")
}

pub(super) async fn run_session<L>(
    runner: &SessionLoop,
    session: &mut Session,
    log: &mut L,
    limits: RunnerLimits,
    emitter: &SessionEventEmitter,
) -> (ExitReason, String)
where
    L: TurnLog + Send + ?Sized,
{
    if let Err(err) = session.transition(AgentState::Running) {
        warn!(session = %session.identity(), error = %err, "session start");
    }
    emitter.emit(AgentEvent::SessionStarted);
    info!(session = %session.identity(), user_id = session.user_id(), "session started");

    let ctx = IterationContext {
        runner,
        limits,
        emitter,
    };
    let mut retry = RetryGovernor::new(RetryPolicy::from_config(&runner.config().retry));
    let mut streak = NoToolCallStreak::default();

    loop {
        if session.iteration() >= limits.max_iterations {
            return (
                ExitReason::MaxIterations,
                max_iterations_message(limits.max_iterations),
            );
        }
        let iteration = session.begin_iteration();
        if debug_enabled() {
            tracing::debug!(
                session = %session.identity(),
                iteration,
                turns = log.len(),
                "iteration start"
            );
        }

        match run_iteration(&ctx, session, log, iteration, &mut streak).await {
            Ok(IterationStep::Continue) => retry.record_success(),
            Ok(IterationStep::Exit { reason, response }) => return (reason, response),
            Err(IterationError::CostLimit(err)) => {
                warn!(session = %session.identity(), error = %err, "cost limit reached");
                return (ExitReason::CostLimit, COST_LIMIT_MESSAGE.to_string());
            }
            Err(IterationError::Recoverable(err)) => {
                warn!(
                    session = %session.identity(),
                    iteration,
                    attempt = retry.attempts() + 1,
                    error = %err,
                    "iteration failed"
                );
                record_failure(log, &err);
                match retry.on_failure(&err) {
                    RetryDecision::Retry { attempt, delay } => {
                        emitter.emit(AgentEvent::RetryScheduled {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                            error: err.to_string(),
                        });
                        session.add_retry_wait(delay);
                        backoff(delay).await;
                    }
                    RetryDecision::GiveUp { message, .. } => {
                        return (ExitReason::RetriesExhausted, message);
                    }
                }
            }
        }
    }
}

async fn backoff(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Leave a synthetic trace of a failed attempt in the log.
///
/// Pending tool calls each get an internal tool turn; otherwise one internal
/// user turn describes the failure.
fn record_failure<L: TurnLog + ?Sized>(log: &mut L, err: &ConductorError) {
    let pending: Vec<ToolCall> = match log.last() {
        Some(turn) if turn.has_tool_calls() => turn.tool_calls().to_vec(),
        _ => Vec::new(),
    };
    if pending.is_empty() {
        log.append(Turn::internal_user(failure_notice(err)));
    } else {
        for call in &pending {
            log.append(Turn::synthetic_tool(call, interrupted_call_notice(&call.name, err)));
        }
    }
}

async fn run_iteration<L>(
    ctx: &IterationContext<'_>,
    session: &mut Session,
    log: &mut L,
    iteration: usize,
    streak: &mut NoToolCallStreak,
) -> Result<IterationStep, IterationError>
where
    L: TurnLog + Send + ?Sized,
{
    let tools = &ctx.runner.tools;
    let decision = resume::analyze(log, tools.as_ref());
    if let Some(kind) = decision.kind() {
        info!(
            session = %session.identity(),
            ?kind,
            pending = decision.pending_calls().len(),
            "resume decided"
        );
        ctx.emitter.emit(AgentEvent::ResumeDecided {
            kind,
            pending_calls: decision.pending_calls().len(),
        });
    }

    let calls = match resume::apply(&decision, log)? {
        Some(calls) => calls,
        None => match run_llm_phase(ctx, session, log, iteration).await? {
            LlmPhaseOutcome::ToolCalls(calls) => {
                streak.reset();
                calls
            }
            LlmPhaseOutcome::NoToolCalls { text } => {
                let count = streak.bump();
                let limit = ctx.limits.no_tool_call_limit;
                if count >= limit {
                    let closing = closing_message(limit);
                    log.append(Turn::assistant(closing.clone()));
                    let response = text.filter(|t| !t.trim().is_empty()).unwrap_or(closing);
                    return Ok(IterationStep::Exit {
                        reason: ExitReason::NoToolCalls,
                        response,
                    });
                }
                log.append(Turn::internal_user(NO_TOOL_CALL_NUDGE));
                return Ok(IterationStep::Continue);
            }
        },
    };

    Ok(run_tool_phase(ctx, session, log, &calls).await)
}

/// Apply the terminal state, release the identity and resources, and report.
///
/// Every exit ending in [`AgentState::Error`] emits `SessionError` before
/// `SessionFinished`.
pub(super) async fn finalize(
    mut session: Session,
    guard: RegistrationGuard,
    emitter: &SessionEventEmitter,
    (exit, response): (ExitReason, String),
) -> SessionOutcome {
    let state = exit.terminal_state();
    if let Err(err) = session.transition(state) {
        warn!(session = %session.identity(), error = %err, "session exit");
    }
    drop(guard);
    let failed = session.release_resources().await;
    if failed > 0 {
        warn!(session = %session.identity(), failed, "session resources not fully released");
    }
    info!(
        session = %session.identity(),
        %state,
        %exit,
        iterations = session.iteration(),
        "session finished"
    );
    if state == AgentState::Error {
        emitter.emit(AgentEvent::SessionError {
            message: response.clone(),
        });
    }
    emitter.emit(AgentEvent::SessionFinished {
        state,
        exit,
        response: response.clone(),
    });
    SessionOutcome {
        state: session.state(),
        response,
        exit,
        iterations: session.iteration(),
    }
}
