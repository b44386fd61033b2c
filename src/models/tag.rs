//! Tag candidates, extractor results, and tag pool entries.

use super::ConversationId;
use serde::{Deserialize, Serialize};

/// An extractor-proposed topic label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCandidate {
    /// Human-formatted label (e.g. "Machine Learning").
    pub name: String,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
    /// Optional explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Result of generating tags for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGenerationResult {
    /// The conversation the tags were generated for.
    pub conversation_id: ConversationId,
    /// Candidates in extractor order.
    pub raw_tags: Vec<TagCandidate>,
    /// Deduplicated, formatted tag labels derived from `raw_tags`.
    pub normalized_tags: Vec<String>,
    /// Optional one-sentence synopsis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl TagGenerationResult {
    /// Creates a result with no tags.
    #[must_use]
    pub const fn empty(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            raw_tags: Vec::new(),
            normalized_tags: Vec::new(),
            summary: None,
        }
    }

    /// Returns true if no tags were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized_tags.is_empty()
    }
}

/// A canonical tag in the materialized tag pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPoolEntry {
    /// Display label chosen for the cluster.
    pub canonical_name: String,
    /// Number of distinct conversations carrying the tag.
    pub usage_count: usize,
    /// Other labels folded into this tag, sorted.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A pending replacement of a conversation's tag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    /// Conversation to update.
    pub conversation_id: ConversationId,
    /// The complete new tag list.
    pub tags: Vec<String>,
}

impl TagUpdate {
    /// Creates a new tag update.
    #[must_use]
    pub fn new(conversation_id: ConversationId, tags: Vec<String>) -> Self {
        Self {
            conversation_id,
            tags,
        }
    }
}
