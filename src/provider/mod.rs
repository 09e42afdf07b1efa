//! Model provider trait and implementations.

pub mod format;
pub mod http;
pub mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConductorError;
use crate::types::{ToolCall, Usage};

/// Text substituted for a model response that carries neither content nor tool calls.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(no response)";

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    /// Conversation rendered to chat-completions wire messages.
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
    pub stop_sequences: Vec<String>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ProviderResponse {
    /// Text-only assistant response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Assistant response requesting tool calls.
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Normalize into an assistant reply the loop can append.
    ///
    /// A response with no text and no tool calls is replaced by
    /// [`EMPTY_RESPONSE_PLACEHOLDER`] and flagged `was_empty`.
    pub fn normalize(self) -> AssistantReply {
        let content = self.content.filter(|text| !text.trim().is_empty());
        let was_empty = content.is_none() && self.tool_calls.is_empty();
        let content = if was_empty {
            Some(EMPTY_RESPONSE_PLACEHOLDER.to_string())
        } else {
            content
        };
        AssistantReply {
            content,
            tool_calls: self.tool_calls,
            usage: self.usage,
            was_empty,
        }
    }
}

/// Normalized model output.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    /// The model returned neither text nor tool calls.
    pub was_empty: bool,
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai-compatible").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderResponse, ConductorError>;
}
