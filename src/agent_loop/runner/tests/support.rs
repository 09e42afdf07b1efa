use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_loop::events::{AgentEvent, SessionEvent, SessionEventSink};
use crate::config::ConductorConfig;
use crate::conversation::InMemoryTurnLog;
use crate::conversation::TurnLog;
use crate::error::ConductorError;
use crate::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use crate::tools::builtin::{ask_user_tool, finish_tool};
use crate::tools::{
    AgentTool, AgentToolParameters, Tool, ToolArguments, ToolExecutionContext, ToolOutput,
    ToolRegistry,
};
use crate::types::{ToolCall, Turn, Usage};

use super::{SessionLoop, SessionRequest};

/// What the provider does once its script runs out.
pub(super) enum Fallback {
    Text(&'static str),
    Error(fn() -> ConductorError),
}

/// Provider that replays a fixed script of responses.
pub(super) struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ConductorError>>>,
    fallback: Fallback,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub(super) fn new(script: Vec<Result<ProviderResponse, ConductorError>>) -> Arc<Self> {
        Self::with_fallback(script, Fallback::Text("script exhausted"))
    }

    pub(super) fn with_fallback(
        script: Vec<Result<ProviderResponse, ConductorError>>,
        fallback: Fallback,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Provider whose every call fails.
    pub(super) fn failing(error: fn() -> ConductorError) -> Arc<Self> {
        Self::with_fallback(Vec::new(), Fallback::Error(error))
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ConductorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(step) => step,
            None => match &self.fallback {
                Fallback::Text(text) => Ok(ProviderResponse::text(*text)),
                Fallback::Error(make) => Err(make()),
            },
        }
    }
}

pub(super) fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub(super) fn calls(calls: Vec<ToolCall>) -> Result<ProviderResponse, ConductorError> {
    Ok(ProviderResponse::tool_calls(calls))
}

pub(super) fn text(content: &str) -> Result<ProviderResponse, ConductorError> {
    Ok(ProviderResponse::text(content))
}

pub(super) fn finish(id: &str, result: &str) -> Result<ProviderResponse, ConductorError> {
    calls(vec![call(
        id,
        "finish",
        &serde_json::json!({ "result": result }).to_string(),
    )])
}

pub(super) fn usage(input_tokens: u32, output_tokens: u32) -> Usage {
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
    }
}

/// Tool that records each invocation and echoes `text`.
pub(super) fn echo_tool(invocations: Arc<AtomicUsize>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "echo",
        "Echo the text argument",
        AgentToolParameters::object()
            .string("text", "Text to echo", true)
            .build(),
        move |args: ToolArguments, _ctx: ToolExecutionContext| {
            let invocations = invocations.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                let text = args.get_str("text")?;
                Ok::<_, ConductorError>(ToolOutput::text(text))
            }
        },
    ))
}

pub(super) fn failing_tool(name: &'static str) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        name,
        "Always fails",
        AgentToolParameters::empty(),
        move |_args: ToolArguments, _ctx: ToolExecutionContext| async move {
            Err::<ToolOutput, _>(ConductorError::tool(name, "disk on fire"))
        },
    ))
}

pub(super) fn sleepy_tool(name: &'static str, delay: Duration) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        name,
        "Sleeps before answering",
        AgentToolParameters::empty(),
        move |_args: ToolArguments, _ctx: ToolExecutionContext| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, ConductorError>(ToolOutput::text(format!("{name} done")))
        },
    ))
}

/// Tool standing in for a nested agent: cannot be replayed.
pub(super) fn delegate_tool(invocations: Arc<AtomicUsize>) -> Arc<dyn Tool> {
    Arc::new(
        AgentTool::new(
            "delegate",
            "Run a sub-agent",
            AgentToolParameters::empty(),
            move |_args: ToolArguments, _ctx: ToolExecutionContext| {
                let invocations = invocations.clone();
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ConductorError>(ToolOutput::text("delegated"))
                }
            },
        )
        .non_resumable(),
    )
}

pub(super) struct PanickingTool {
    params: AgentToolParameters,
}

impl PanickingTool {
    pub(super) fn arc() -> Arc<dyn Tool> {
        Arc::new(Self {
            params: AgentToolParameters::empty(),
        })
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "panics"
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.params
    }

    async fn execute(
        &self,
        _args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<ToolOutput, ConductorError> {
        panic!("tool exploded")
    }
}

/// Registry with `finish`, `ask_user` and the given extra tools.
pub(super) fn registry(extra: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new()
        .with_tool(finish_tool())
        .with_tool(ask_user_tool());
    for tool in extra {
        registry.register(tool);
    }
    Arc::new(registry)
}

/// Defaults with short backoff so retry tests stay fast.
pub(super) fn test_config() -> ConductorConfig {
    let mut config = ConductorConfig::default();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config.retry.max_attempts = 3;
    config.retry.max_total_wait_ms = 10_000;
    config
}

pub(super) fn test_loop(provider: Arc<ScriptedProvider>, tools: Arc<ToolRegistry>) -> SessionLoop {
    SessionLoop::new(provider, tools).with_config(test_config())
}

pub(super) fn request(agent_id: &str) -> SessionRequest {
    SessionRequest::builder()
        .agent_name("tester")
        .agent_id(agent_id)
        .user_id("user-1")
        .build()
}

pub(super) fn request_with_sink(agent_id: &str, sink: SessionEventSink) -> SessionRequest {
    SessionRequest::builder()
        .agent_name("tester")
        .agent_id(agent_id)
        .user_id("user-1")
        .event_sink(sink)
        .build()
}

pub(super) fn user_log(text: &str) -> InMemoryTurnLog {
    let mut log = InMemoryTurnLog::new();
    log.append(Turn::system("You are a careful assistant."));
    log.append(Turn::user(text));
    log
}

pub(super) fn capture_events() -> (SessionEventSink, Arc<Mutex<Vec<SessionEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::<SessionEvent>::new()));
    let sink_events = events.clone();
    let sink: SessionEventSink = Arc::new(move |event| {
        if let Ok(mut guard) = sink_events.lock() {
            guard.push(event);
        }
        Ok(())
    });
    (sink, events)
}

pub(super) fn event_kinds(events: &Arc<Mutex<Vec<SessionEvent>>>) -> Vec<AgentEvent> {
    events
        .lock()
        .expect("events lock")
        .iter()
        .map(|envelope| envelope.event.clone())
        .collect()
}

pub(super) fn tool_turns(log: &InMemoryTurnLog) -> Vec<(String, String)> {
    log.turns()
        .iter()
        .filter_map(|turn| match turn {
            Turn::Tool {
                tool_call_id,
                content,
                ..
            } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect()
}

pub(super) fn internal_user_turns(log: &InMemoryTurnLog) -> Vec<String> {
    log.turns()
        .iter()
        .filter(|turn| turn.is_user() && turn.is_internal())
        .map(|turn| turn.text().to_string())
        .collect()
}
