//! Conversation records and their documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates a new conversation ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a conversation was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationSource {
    /// `ChatGPT` export.
    ChatGpt,
    /// Claude export.
    Claude,
    /// Gemini export.
    Gemini,
    /// Typed in by hand.
    #[default]
    Manual,
    /// Captured by the browser extension.
    Extension,
    /// Anything else.
    Other,
}

impl ConversationSource {
    /// Returns the source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Manual => "manual",
            Self::Extension => "extension",
            Self::Other => "other",
        }
    }

    /// Parses a source string, mapping unknown values to `Other`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "chatgpt" | "openai" => Self::ChatGpt,
            "claude" | "anthropic" => Self::Claude,
            "gemini" => Self::Gemini,
            "manual" => Self::Manual,
            "extension" => Self::Extension,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ConversationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored conversation.
///
/// `tags` is owned by the re-tagger: every pass replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title, used as extra tagging signal.
    pub title: String,
    /// Import source.
    pub source: ConversationSource,
    /// Current tags (insertion order irrelevant).
    pub tags: Vec<String>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last update timestamp (Unix epoch seconds).
    pub updated_at: u64,
}

impl Conversation {
    /// Creates an untagged conversation with a generated ID.
    #[must_use]
    pub fn new(title: impl Into<String>, source: ConversationSource) -> Self {
        let now = crate::current_timestamp();
        Self {
            id: ConversationId::generate(),
            title: title.into(),
            source,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ConversationId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human.
    #[default]
    User,
    /// The model.
    Assistant,
    /// System prompt.
    System,
}

impl MessageRole {
    /// Returns the role as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parses a role string, defaulting to `User`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

/// A single message body belonging to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Speaker.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
    /// Position within the conversation.
    pub position: u32,
}

impl Message {
    /// Creates a message with a generated ID.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        role: MessageRole,
        content: impl Into<String>,
        position: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            role,
            content: content.into(),
            position,
        }
    }
}

/// A question/answer pair extracted from a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    /// Unique identifier.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// The user's question.
    pub question: String,
    /// The assistant's answer.
    pub answer: String,
    /// Position within the conversation.
    pub position: u32,
}

impl QaPair {
    /// Creates a QA pair with a generated ID.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        question: impl Into<String>,
        answer: impl Into<String>,
        position: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            question: question.into(),
            answer: answer.into(),
            position,
        }
    }

    /// Renders the pair as a single tagging document.
    #[must_use]
    pub fn as_document(&self) -> String {
        format!("{}\n\n{}", self.question, self.answer)
    }
}
