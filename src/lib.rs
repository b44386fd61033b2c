//! # Memoria
//!
//! Automatic tagging for a personal knowledge base of AI-chat transcripts.
//!
//! Memoria turns free-text conversation content into a small set of topic
//! tags and keeps the corpus-wide tag pool free of near-duplicates
//! ("CV", "Resume", "Resumes" and "Curriculum Vitae" end up as one tag).
//!
//! ## Features
//!
//! - Deterministic TF-IDF keyword extraction, always available
//! - Optional LLM-assisted extraction with transparent keyword fallback
//! - Morphology-aware tag canonicalization with union-find clustering
//! - Optional LLM clustering head start, always post-processed deterministically
//! - Transactional re-tagging over a pluggable conversation store (`SQLite`, in-memory)
//!
//! ## Example
//!
//! ```rust
//! use memoria::services::tagging::TagCanonicalizer;
//!
//! let canonicalizer = TagCanonicalizer::default();
//! let map = canonicalizer.build_canonical_map(&["CV Writing", "Resume Writing Tips"]);
//! assert_eq!(map.resolve("Resume Writing Tips"), "CV Writing");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::MemoriaConfig;
pub use llm::LlmProvider;
pub use models::{
    Conversation, ConversationId, ConversationSource, TagCandidate, TagGenerationResult,
    TagPoolEntry,
};
pub use services::RetagService;
pub use services::tagging::{
    CanonicalMap, KeywordTagExtractor, LlmTagExtractor, TagCanonicalizer, TagExtractor,
};
pub use storage::{ConversationStore, InMemoryConversationStore, SqliteConversationStore};

/// Error type for memoria operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed CLI arguments, unknown provider names, empty required fields |
/// | `OperationFailed` | Store transactions fail, LLM requests fail, config files cannot be read |
/// | `NotFound` | A conversation id requested for ingestion does not exist |
///
/// LLM failures never escape the tagging services: they are logged and
/// resolved by falling back to keyword extraction.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements or transactions fail
    /// - An LLM request fails or returns an unparseable body
    /// - Configuration or log files cannot be read or opened
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for memoria operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
