//! Generic OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ConductorError;
use crate::types::{ToolCall, Usage};

use super::http::{
    bearer_headers, build_client, shared_client, status_to_error, DEFAULT_REQUEST_TIMEOUT,
};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const PROVIDER_NAME: &str = "openai-compatible";

/// Provider for any API speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleProvider {
    model_id: String,
    api_key: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        model_id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_tokens: None,
            temperature: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client: shared_client().clone(),
        }
    }

    /// Build from the `[provider]` config section.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConductorError> {
        let api_key = config.api_key.clone().unwrap_or_default();
        let mut provider = Self::new(config.model.clone(), api_key, config.base_url.clone());
        provider.max_tokens = config.max_tokens;
        provider.temperature = config.temperature;
        provider.timeout = config.request_timeout();
        provider.client = build_client(provider.timeout)?;
        Ok(provider)
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model_id,
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = self.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = self.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if !request.stop_sequences.is_empty() {
                obj.insert("stop".into(), serde_json::json!(request.stop_sequences));
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ConductorError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model_id, messages = request.messages.len(), "chat completion");

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConductorError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ConductorError::Network(err)
                }
            })?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: ChatResponse = resp.json().await?;
        let choice = data.choices.into_iter().next().ok_or_else(|| ConductorError::Provider {
            provider: PROVIDER_NAME.into(),
            message: "no choices in response".into(),
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        Ok(ProviderResponse {
            role: choice.message.role.unwrap_or_else(|| "assistant".into()),
            content: choice.message.content,
            tool_calls,
            usage: data
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    #[test]
    fn request_body_includes_tools_and_stops() {
        let provider = OpenAiCompatibleProvider::new("m-1", "k", "http://localhost:8080/v1/");
        let request = ProviderRequest {
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            tools: vec![ToolDefinition {
                name: "finish".into(),
                description: "done".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            stop_sequences: vec!["</done>".into()],
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "m-1");
        assert_eq!(body["stop"][0], "</done>");
        assert_eq!(body["tools"][0]["function"]["name"], "finish");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn empty_tool_list_is_omitted() {
        let provider = OpenAiCompatibleProvider::new("m-1", "", "http://x");
        let body = provider.build_request_body(&ProviderRequest::default());
        assert!(body.get("tools").is_none());
        assert!(body.get("stop").is_none());
    }
}
