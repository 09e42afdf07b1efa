//! Core session types for the agent loop.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::ConductorError;

/// Lifecycle state of a session.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Validate a transition. Terminal states are final.
    pub fn transition(self, next: AgentState) -> Result<AgentState, ConductorError> {
        match (self, next) {
            (Self::Idle, Self::Running)
            | (Self::Running, Self::Finished)
            | (Self::Running, Self::Error) => Ok(next),
            _ => Err(ConductorError::InvalidState(format!(
                "illegal transition {self} -> {next}"
            ))),
        }
    }
}

/// Identity of a live session: unique among running sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub agent_name: String,
    pub agent_id: String,
}

impl SessionIdentity {
    pub fn new(agent_name: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_id: agent_id.into(),
        }
    }

    /// Identity with a fresh v4 agent id.
    pub fn generate(agent_name: impl Into<String>) -> Self {
        Self::new(agent_name, Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.agent_name, self.agent_id)
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExitReason {
    /// A tool signalled completion.
    Finished,
    /// A tool asked the user for input.
    AwaitingUser,
    MaxIterations,
    /// The model kept replying without calling tools.
    NoToolCalls,
    CostLimit,
    RetriesExhausted,
}

impl ExitReason {
    /// Terminal state a session ends in for this reason.
    pub fn terminal_state(self) -> AgentState {
        match self {
            Self::Finished | Self::AwaitingUser => AgentState::Finished,
            _ => AgentState::Error,
        }
    }
}

/// Final result of a session run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionOutcome {
    pub state: AgentState,
    /// Final text for the user (possibly empty).
    pub response: String,
    pub exit: ExitReason,
    pub iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn terminal_states_are_final() {
        assert_eq!(
            AgentState::Idle.transition(AgentState::Running).unwrap(),
            AgentState::Running
        );
        assert!(AgentState::Finished.transition(AgentState::Running).is_err());
        assert!(AgentState::Error.transition(AgentState::Finished).is_err());
        assert!(AgentState::Idle.transition(AgentState::Finished).is_err());
    }

    #[test]
    fn state_round_trips_through_strum() {
        assert_eq!(AgentState::Running.to_string(), "running");
        assert_eq!(AgentState::from_str("error").unwrap(), AgentState::Error);
        assert_eq!(ExitReason::NoToolCalls.to_string(), "no_tool_calls");
    }

    #[test]
    fn exit_reason_maps_to_terminal_state() {
        assert_eq!(ExitReason::AwaitingUser.terminal_state(), AgentState::Finished);
        assert_eq!(ExitReason::CostLimit.terminal_state(), AgentState::Error);
    }
}
