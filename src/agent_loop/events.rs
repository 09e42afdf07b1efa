//! Session event stream types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConductorError;
use crate::types::{ToolCall, Usage};

use super::resume::ResumeKind;
use super::types::{AgentState, ExitReason, SessionIdentity};

/// Lifecycle notifications emitted by the session loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    SessionStarted,
    BeforeModelCall {
        iteration: usize,
        turns: usize,
    },
    AfterModelCall {
        iteration: usize,
        usage: Usage,
        tool_calls: usize,
    },
    /// The model returned neither text nor tool calls; a placeholder was appended.
    EmptyModelResponse {
        iteration: usize,
    },
    BeforeToolCall {
        call: ToolCall,
    },
    AfterToolCall {
        call_id: String,
        tool_name: String,
        ok: bool,
        duration_ms: u64,
    },
    ResumeDecided {
        kind: ResumeKind,
        pending_calls: usize,
    },
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    SessionFinished {
        state: AgentState,
        exit: ExitReason,
        response: String,
    },
    /// The session is ending in `Error`; `message` is its final response.
    SessionError {
        message: String,
    },
}

/// Envelope for session events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvent {
    pub session: SessionIdentity,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: AgentEvent,
}

/// Listener for session events. Errors and panics are logged and otherwise ignored.
pub type SessionEventSink = Arc<dyn Fn(SessionEvent) -> Result<(), ConductorError> + Send + Sync>;
