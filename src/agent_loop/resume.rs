//! Deciding what to do with tool calls left pending by an interrupted session.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conversation::TurnLog;
use crate::error::ConductorError;
use crate::tools::ToolExecutor;
use crate::types::{ToolCall, Turn};

const CONTINUE_SYNONYMS: &str =
    r"(?i)^\s*(continue|go on|resume|proceed|keep going|carry on)[\s[:punct:]]*$";

static CONTINUE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn continue_pattern() -> Option<&'static Regex> {
    CONTINUE_PATTERN
        .get_or_init(|| Regex::new(CONTINUE_SYNONYMS).ok())
        .as_ref()
}

/// How pending calls were handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeKind {
    /// The user asked to continue; pending calls are executed as-is.
    Replay,
    /// The user asked to continue but a pending call cannot be replayed.
    RefusedNonResumable,
    /// The user sent a new request; the model decides what to do.
    RefusedNewRequest,
}

/// Result of inspecting the tail of the log.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeDecision {
    /// The log does not end with an interrupted tool-call turn.
    NotApplicable,
    /// Drop the user's turn and execute these calls without a model call.
    Replay { calls: Vec<ToolCall> },
    /// Answer every pending call with a synthetic result and call the model.
    Refuse { kind: ResumeKind, calls: Vec<ToolCall> },
}

impl ResumeDecision {
    pub fn kind(&self) -> Option<ResumeKind> {
        match self {
            Self::NotApplicable => None,
            Self::Replay { .. } => Some(ResumeKind::Replay),
            Self::Refuse { kind, .. } => Some(*kind),
        }
    }

    pub fn pending_calls(&self) -> &[ToolCall] {
        match self {
            Self::NotApplicable => &[],
            Self::Replay { calls } | Self::Refuse { calls, .. } => calls,
        }
    }
}

/// Whether `text` means "carry on with what you were doing".
pub fn is_continue_request(text: &str, first_user_message: Option<&str>) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if first_user_message.is_some_and(|first| first.trim() == trimmed) {
        return true;
    }
    continue_pattern().is_some_and(|pattern| pattern.is_match(trimmed))
}

/// Inspect the last two turns.
///
/// Only applies when the log ends with a user turn directly after an
/// assistant turn whose tool calls were never answered.
pub fn analyze<L: TurnLog + ?Sized>(log: &L, tools: &dyn ToolExecutor) -> ResumeDecision {
    let (Some(last), Some(previous)) = (log.last(), log.second_last()) else {
        return ResumeDecision::NotApplicable;
    };
    if !last.is_user() || !previous.has_tool_calls() {
        return ResumeDecision::NotApplicable;
    }
    let calls = previous.tool_calls().to_vec();

    if !is_continue_request(last.text(), log.first_user_message()) {
        return ResumeDecision::Refuse {
            kind: ResumeKind::RefusedNewRequest,
            calls,
        };
    }
    if calls.iter().any(|call| !tools.is_resumable(&call.name)) {
        return ResumeDecision::Refuse {
            kind: ResumeKind::RefusedNonResumable,
            calls,
        };
    }
    ResumeDecision::Replay { calls }
}

/// Apply a decision to the log. Returns the calls to execute now, if any.
pub fn apply<L: TurnLog + ?Sized>(
    decision: &ResumeDecision,
    log: &mut L,
) -> Result<Option<Vec<ToolCall>>, ConductorError> {
    match decision {
        ResumeDecision::NotApplicable => Ok(None),
        ResumeDecision::Replay { calls } => {
            log.remove_last();
            Ok(Some(calls.clone()))
        }
        ResumeDecision::Refuse { kind, calls } => {
            for call in calls {
                log.insert_before_last(Turn::synthetic_tool(call, refusal_notice(*kind, call)))?;
            }
            if *kind == ResumeKind::RefusedNonResumable {
                log.replace_last_user_content(
                    "Continue the interrupted task. Calls to delegated agents cannot be \
                     replayed automatically; issue them again if they are still needed."
                        .to_string(),
                )?;
            }
            Ok(None)
        }
    }
}

fn refusal_notice(kind: ResumeKind, call: &ToolCall) -> String {
    match kind {
        ResumeKind::RefusedNonResumable => format!(
            "The session was interrupted before `{}` ran. It starts a nested agent and cannot \
             be replayed; call it again if it is still needed.",
            call.name
        ),
        _ => format!(
            "The session was interrupted before `{}` ran and the user has sent a new message. \
             Decide whether to continue the interrupted work or handle the new request; call \
             the tool again if it is still needed.",
            call.name
        ),
    }
}
