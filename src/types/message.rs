//! Conversation turns, tool calls and tool results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
        /// Visible to the model, hidden from the end user.
        #[serde(default)]
        internal: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
        #[serde(default)]
        internal: bool,
    },
}

impl Turn {
    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            internal: false,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user turn that only the model sees.
    pub fn internal_user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            internal: true,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant turn with text only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant turn carrying tool calls.
    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool turn from an executed result.
    pub fn tool_result(call: &ToolCall, result: &ToolResult) -> Self {
        Self::Tool {
            tool_call_id: result.call_id.clone(),
            name: call.name.clone(),
            content: result.content.clone(),
            internal: false,
        }
    }

    /// Create a synthetic tool turn answering `call` without executing it.
    pub fn synthetic_tool(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            internal: true,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn is_internal(&self) -> bool {
        match self {
            Self::User { internal, .. } | Self::Tool { internal, .. } => *internal,
            _ => false,
        }
    }

    /// Text content of the turn (empty when an assistant turn carries only calls).
    pub fn text(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content, .. } | Self::Tool { content, .. } => {
                content
            }
            Self::Assistant { content, .. } => content.as_deref().unwrap_or(""),
        }
    }

    /// Tool calls carried by an assistant turn.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument payload, expected to be a JSON object.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Control signal a tool can attach to its result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// The task is complete; the result content is the final response.
    Finish,
    /// The agent needs input from the user before continuing.
    AskUser,
}

/// Outcome of executing one tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub ok: bool,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<ControlSignal>,
    #[serde(default)]
    pub duration: Duration,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            ok: true,
            content: content.into(),
            signal: None,
            duration: Duration::ZERO,
        }
    }

    pub fn failure(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            ok: false,
            content: content.into(),
            signal: None,
            duration: Duration::ZERO,
        }
    }

    pub fn with_signal(mut self, signal: ControlSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_serializes_with_role_tag() {
        let turn = Turn::synthetic_tool(&ToolCall::new("c1", "grep", "{}"), "interrupted");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "c1");
        assert_eq!(json["internal"], true);
    }

    #[test]
    fn assistant_without_content_has_empty_text() {
        let turn = Turn::assistant_with_calls(None, vec![ToolCall::new("c1", "ls", "{}")]);
        assert_eq!(turn.text(), "");
        assert!(turn.has_tool_calls());
        assert!(!Turn::user("hi").has_tool_calls());
    }
}
