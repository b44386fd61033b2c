//! Anthropic client.
//!
//! The Messages API has no response-schema parameter, so a requested schema
//! is appended to the system prompt instead.

use super::http::{ApiSettings, Transport, non_empty_env};
use super::{ChatRole, CompletionRequest, LlmProvider};
use crate::Result;
use serde::{Deserialize, Serialize};

const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Value of the `anthropic-version` header.
const API_VERSION: &str = "2023-06-01";

/// Anthropic LLM client.
pub struct AnthropicClient {
    transport: Transport,
}

impl AnthropicClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-haiku-latest";

    /// Settings read from `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL` and
    /// `ANTHROPIC_MODEL`.
    #[must_use]
    pub fn env_settings() -> ApiSettings {
        ApiSettings::new(
            non_empty_env("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
            non_empty_env("ANTHROPIC_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
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
            transport: Transport::new("anthropic", settings),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn settings(&self) -> &ApiSettings {
        self.transport.settings()
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let system = request.system_prompt_with_schema();
        MessagesRequest {
            model: self.transport.model(),
            max_tokens: request.max_tokens,
            system: (!system.is_empty()).then_some(system),
            temperature: request.temperature,
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| Turn {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }

    fn request(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self.transport.api_key(API_KEY_VAR)?;
        let reply: MessagesResponse = self.transport.post(
            "messages",
            &[
                ("x-api-key", api_key.to_string()),
                ("anthropic-version", API_VERSION.to_string()),
            ],
            &self.build_request(request),
        )?;

        let text = reply.text();
        if text.trim().is_empty() {
            return Err(self
                .transport
                .failure("response", "no text content in reply".to_string()));
        }
        Ok(text)
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Turn<'a>>,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenates the text blocks, skipping any other block type.
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::with_settings(ApiSettings::new(
            AnthropicClient::DEFAULT_ENDPOINT,
            AnthropicClient::DEFAULT_MODEL,
        ))
    }

    #[test]
    fn test_unconfigured_without_key() {
        let client = client();
        assert_eq!(client.name(), "anthropic");
        assert!(!client.is_configured());
        assert!(client.complete("hello").is_err());
    }

    #[test]
    fn test_any_non_blank_key_configures() {
        let mut settings = ApiSettings::new(AnthropicClient::DEFAULT_ENDPOINT, "claude-test");
        settings.api_key = Some("key-from-proxy".to_string());
        assert!(AnthropicClient::with_settings(settings).is_configured());
    }

    #[test]
    fn test_schema_moves_into_system_prompt() {
        let request = CompletionRequest::new("You tag things.", "Tag this")
            .with_schema("conversation_tags", serde_json::json!({"required": ["tags"]}))
            .with_max_tokens(600)
            .with_temperature(0.2);

        let client = client();
        let body = client.build_request(&request);
        assert_eq!(body.max_tokens, 600);
        assert_eq!(body.temperature, Some(0.2));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.messages[0].content, "Tag this");
        let system = body.system.unwrap_or_default();
        assert!(system.starts_with("You tag things."));
        assert!(system.contains("required"));
    }

    #[test]
    fn test_plain_completion_has_no_system() {
        let client = client();
        let request = CompletionRequest::from_user("hello");
        let body = client.build_request(&request);
        assert!(body.system.is_none());
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn test_reply_text_blocks_are_joined() {
        let reply: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "{\"tags\""}, {"type": "tool_use"}, {"type": "text", "text": ": []}"}]}"#,
        )
        .unwrap();
        assert_eq!(reply.text(), r#"{"tags": []}"#);
    }
}
