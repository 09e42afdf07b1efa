use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::FutureExt;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::warn;

use crate::tools::{ToolArguments, ToolExecutor};
use crate::types::{ToolCall, ToolResult};

use super::super::events::AgentEvent;
use super::control::{debug_enabled, SessionEventEmitter};

/// Keep only the first call unless multi-call batches are allowed.
pub(super) fn admit_tool_calls(mut calls: Vec<ToolCall>, allow_multiple: bool) -> Vec<ToolCall> {
    if !allow_multiple && calls.len() > 1 {
        let dropped: Vec<&str> = calls[1..].iter().map(|call| call.name.as_str()).collect();
        tracing::debug!(kept = %calls[0].name, ?dropped, "multi-call batch downgraded");
        calls.truncate(1);
    }
    calls
}

fn timed_out_result(call: &ToolCall, timeout: Duration) -> ToolResult {
    ToolResult::failure(
        &call.id,
        format!(
            "tool `{}` did not finish within the batch timeout of {}ms",
            call.name,
            timeout.as_millis()
        ),
    )
    .with_duration(timeout)
}

fn panicked_result(call: &ToolCall, elapsed: Duration) -> ToolResult {
    ToolResult::failure(&call.id, format!("tool `{}` panicked", call.name))
        .with_duration(elapsed)
}

fn join_failure_result(call: &ToolCall, err: JoinError) -> ToolResult {
    if err.is_panic() {
        panicked_result(call, Duration::ZERO)
    } else {
        ToolResult::failure(&call.id, format!("tool `{}` was cancelled", call.name))
    }
}

/// Parse arguments and execute one call. Never fails.
///
/// Unparseable arguments are passed as `{}`; if the tool then fails, the
/// parse diagnostic is appended to its error.
pub(super) async fn execute_tool_call(tools: &dyn ToolExecutor, call: &ToolCall) -> ToolResult {
    let parsed = ToolArguments::parse(&call.arguments);
    if let Some(diagnostic) = &parsed.parse_error {
        warn!(
            tool = %call.name,
            call_id = %call.id,
            %diagnostic,
            "falling back to empty arguments"
        );
    }
    let mut result = tools.execute(&call.id, &call.name, parsed.arguments).await;
    if !result.ok {
        if let Some(diagnostic) = parsed.parse_error {
            result.content = format!("{}\n(argument parse error: {diagnostic})", result.content);
        }
    }
    result
}

pub(super) fn emit_tool_call_start(emitter: &SessionEventEmitter, call: &ToolCall) {
    emitter.emit(AgentEvent::BeforeToolCall { call: call.clone() });
}

pub(super) fn emit_tool_call_end(
    emitter: &SessionEventEmitter,
    call: &ToolCall,
    result: &ToolResult,
) {
    if debug_enabled() {
        tracing::debug!(
            tool = %call.name,
            call_id = %call.id,
            ok = result.ok,
            duration_ms = result.duration.as_millis() as u64,
            "tool call finished"
        );
    }
    emitter.emit(AgentEvent::AfterToolCall {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        ok: result.ok,
        duration_ms: result.duration.as_millis() as u64,
    });
}

/// Run calls one at a time, in order. A panicking tool becomes a failing result.
pub(super) async fn execute_sequential_tool_calls(
    tools: &dyn ToolExecutor,
    calls: &[ToolCall],
    emitter: &SessionEventEmitter,
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        emit_tool_call_start(emitter, call);
        let started = Instant::now();
        let result = match AssertUnwindSafe(execute_tool_call(tools, call))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.name, call_id = %call.id, "tool panicked");
                panicked_result(call, started.elapsed())
            }
        };
        emit_tool_call_end(emitter, call, &result);
        results.push(result);
    }
    results
}

/// Run all calls concurrently, each on its own task.
///
/// With a batch timeout, calls still running at the shared deadline resolve to
/// a synthetic failing result; their tasks are detached, not aborted. Results
/// come back in call order.
pub(super) async fn execute_parallel_tool_calls(
    tools: &Arc<dyn ToolExecutor>,
    calls: &[ToolCall],
    batch_timeout: Option<Duration>,
    emitter: &SessionEventEmitter,
) -> Vec<ToolResult> {
    let deadline = batch_timeout.map(|timeout| (Instant::now() + timeout, timeout));
    let handles: Vec<_> = calls
        .iter()
        .map(|call| {
            emit_tool_call_start(emitter, call);
            let tools = Arc::clone(tools);
            let call = call.clone();
            tokio::spawn(async move { execute_tool_call(tools.as_ref(), &call).await })
        })
        .collect();

    let waits = handles.into_iter().zip(calls).map(|(handle, call)| async move {
        let joined = match deadline {
            Some((deadline, timeout)) => match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        tool = %call.name,
                        call_id = %call.id,
                        "tool call abandoned at batch timeout"
                    );
                    return timed_out_result(call, timeout);
                }
            },
            None => handle.await,
        };
        joined.unwrap_or_else(|err| join_failure_result(call, err))
    });

    let results = future::join_all(waits).await;
    for (call, result) in calls.iter().zip(&results) {
        emit_tool_call_end(emitter, call, result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_call_admission_keeps_the_first_call() {
        let calls = vec![
            ToolCall::new("c1", "read", "{}"),
            ToolCall::new("c2", "write", "{}"),
        ];
        let admitted = admit_tool_calls(calls.clone(), false);
        assert_eq!(admitted, vec![calls[0].clone()]);
        assert_eq!(admit_tool_calls(calls.clone(), true), calls);
        assert!(admit_tool_calls(Vec::new(), false).is_empty());
    }
}
