//! LLM client abstraction.
//!
//! Provides a unified, blocking interface over chat-completion providers.
//! Tagging and tag clustering only ever talk to [`LlmProvider`]; they never
//! see HTTP.

mod anthropic;
mod http;
mod openai;

pub use anthropic::AnthropicClient;
pub use http::{ApiSettings, build_http_client};
pub use openai::OpenAiClient;

use crate::Result;
use serde::Serialize;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Returns true if the provider has what it needs to make requests.
    ///
    /// Callers that treat the model as optional check this before building a
    /// prompt and take their local path when it is false.
    fn is_configured(&self) -> bool {
        true
    }

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }

    /// Runs a structured completion request and returns the raw text reply.
    ///
    /// The default implementation folds the response schema into the system
    /// prompt. Providers with native structured output override this.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_structured(&self, request: &CompletionRequest) -> Result<String> {
        self.complete_with_system(&request.system_prompt_with_schema(), &request.user_prompt())
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the model.
    System,
    /// End-user content.
    User,
    /// Prior model output.
    Assistant,
}

impl ChatRole {
    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A named JSON schema the reply must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema name, reported to providers that support named schemas.
    pub name: String,
    /// JSON schema document.
    pub schema: serde_json::Value,
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation messages, in order.
    pub messages: Vec<ChatMessage>,
    /// Optional structured output schema.
    pub schema: Option<ResponseSchema>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature, when the model supports it.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Default token limit.
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;

    /// Creates a request from a system and a user prompt.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            schema: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Creates a request with a single user message and no system prompt.
    #[must_use]
    pub fn from_user(user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(user)],
            schema: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Sets the response schema.
    #[must_use]
    pub fn with_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.schema = Some(ResponseSchema {
            name: name.into(),
            schema,
        });
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Joins all system messages.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        self.join_role(ChatRole::System)
    }

    /// Joins all user messages.
    #[must_use]
    pub fn user_prompt(&self) -> String {
        self.join_role(ChatRole::User)
    }

    /// Returns the system prompt with the schema appended as an instruction.
    ///
    /// Used by providers without native structured output.
    #[must_use]
    pub fn system_prompt_with_schema(&self) -> String {
        let system = self.system_prompt();
        match &self.schema {
            Some(schema) => format!(
                "{system}\n\nRespond only with a JSON object matching this schema:\n{}",
                schema.schema
            ),
            None => system,
        }
    }

    fn join_role(&self, role: ChatRole) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_millis("MEMORIA_LLM_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_millis("MEMORIA_LLM_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

fn env_millis(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses a JSON reply into `T`, tolerating markdown fences and chatter.
///
/// # Errors
///
/// Returns an error naming `operation` if the reply is not valid JSON for `T`.
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    operation: &str,
    response: &str,
) -> Result<T> {
    let json_str = extract_json_from_response(response);
    serde_json::from_str(json_str).map_err(|e| crate::Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("Invalid JSON: {e}. Response: {response}"),
    })
}

/// Extracts JSON from LLM response, handling markdown code blocks.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed.rfind(']') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}
