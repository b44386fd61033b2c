//! `OpenAI` client.
//!
//! Speaks the Chat Completions protocol, so it also works against
//! compatible local servers via `OPENAI_BASE_URL` or `llm.base_url`.

use super::http::{ApiSettings, Transport, non_empty_env};
use super::{ChatMessage, CompletionRequest, LlmProvider};
use crate::Result;
use serde::{Deserialize, Serialize};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    transport: Transport,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Settings read from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    #[must_use]
    pub fn env_settings() -> ApiSettings {
        ApiSettings::new(
            non_empty_env("OPENAI_BASE_URL").unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
            non_empty_env("OPENAI_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
        )
        .with_key_from_env(API_KEY_VAR)
    }

    /// Creates a client from environment settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Self::env_settings())
    }

    /// Creates a client from explicit settings.
    #[must_use]
    pub fn with_settings(settings: ApiSettings) -> Self {
        Self {
            transport: Transport::new("openai", settings),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn settings(&self) -> &ApiSettings {
        self.transport.settings()
    }

    /// Reasoning models take `max_completion_tokens` and reject `temperature`.
    fn is_reasoning_model(model: &str) -> bool {
        ["gpt-5", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| model.starts_with(prefix))
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        let model = self.transport.model();
        let reasoning = Self::is_reasoning_model(model);
        ChatCompletionRequest {
            model,
            messages: &request.messages,
            max_tokens: (!reasoning).then_some(request.max_tokens),
            max_completion_tokens: reasoning.then_some(request.max_tokens),
            temperature: request.temperature.filter(|_| !reasoning),
            response_format: request.schema.as_ref().map(|schema| ResponseFormat {
                format_type: "json_schema",
                json_schema: NamedSchema {
                    name: &schema.name,
                    schema: &schema.schema,
                },
            }),
        }
    }

    fn request(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self.transport.api_key(API_KEY_VAR)?;
        let reply: ChatCompletionResponse = self.transport.post(
            "chat/completions",
            &[("Authorization", format!("Bearer {api_key}"))],
            &self.build_request(request),
        )?;

        reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| self.transport.failure("response", "no content in reply".to_string()))
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.transport.api_key(API_KEY_VAR).is_ok()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(&CompletionRequest::from_user(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(&CompletionRequest::new(system, user))
    }

    fn complete_structured(&self, request: &CompletionRequest) -> Result<String> {
        self.request(request)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: NamedSchema<'a>,
}

#[derive(Debug, Serialize)]
struct NamedSchema<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(model: &str) -> OpenAiClient {
        OpenAiClient::with_settings(ApiSettings::new(OpenAiClient::DEFAULT_ENDPOINT, model))
    }

    fn body(model: &str, request: &CompletionRequest) -> serde_json::Value {
        let client = client(model);
        serde_json::to_value(client.build_request(request)).unwrap()
    }

    #[test]
    fn test_unconfigured_without_key() {
        let client = client(OpenAiClient::DEFAULT_MODEL);
        assert_eq!(client.name(), "openai");
        assert!(!client.is_configured());
        assert!(client.complete("hello").is_err());
    }

    #[test]
    fn test_configured_with_key() {
        let mut settings = ApiSettings::new(OpenAiClient::DEFAULT_ENDPOINT, "gpt-4o");
        settings.api_key = Some("sk-test".to_string());
        let client = OpenAiClient::with_settings(settings);
        assert!(client.is_configured());
        assert_eq!(client.settings().model, "gpt-4o");
    }

    #[test]
    fn test_reasoning_model_detection() {
        for model in ["gpt-5-mini", "gpt-5", "o1-preview", "o3-mini", "o4-mini"] {
            assert!(OpenAiClient::is_reasoning_model(model), "{model}");
        }
        for model in ["gpt-4o", "gpt-4o-mini", "gpt-4.1", "llama3"] {
            assert!(!OpenAiClient::is_reasoning_model(model), "{model}");
        }
    }

    #[test]
    fn test_tagging_request_body() {
        let request = CompletionRequest::new("sys", "user")
            .with_schema("conversation_tags", serde_json::json!({"type": "object"}))
            .with_max_tokens(600)
            .with_temperature(0.2);

        let body = body("gpt-4o-mini", &request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 600);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "conversation_tags");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
    }

    #[test]
    fn test_reasoning_request_body_drops_temperature() {
        let request = CompletionRequest::new("sys", "user").with_temperature(0.2);
        let body = body("gpt-5-mini", &request);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["max_completion_tokens"], CompletionRequest::DEFAULT_MAX_TOKENS);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_plain_completion_has_only_user_message() {
        let body = body("gpt-4o", &CompletionRequest::from_user("hello"));
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
