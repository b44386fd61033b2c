//! Tag extractor interface and construction from configuration.

use super::{KeywordTagExtractor, LlmTagExtractor, Vocabulary};
use crate::config::TaggingConfig;
use crate::llm::LlmProvider;
use crate::models::{Conversation, TagGenerationResult};
use std::sync::Arc;

/// Generates tags for a single conversation.
///
/// Implementations never fail: anything that goes wrong while tagging is
/// logged and resolved to a degraded-but-valid result (possibly empty).
pub trait TagExtractor: Send + Sync {
    /// The extractor name, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Generates tags from a conversation's title and documents.
    fn generate_tags(&self, conversation: &Conversation, documents: &[String])
    -> TagGenerationResult;
}

/// Builds the extractor selected by `config.use_llm`.
///
/// The LLM-assisted variant is chosen whenever `use_llm` is set, even if no
/// provider is available; it then behaves exactly like the keyword
/// extractor.
#[must_use]
pub fn build_tag_extractor(
    config: &TaggingConfig,
    vocabulary: Arc<Vocabulary>,
    provider: Option<Arc<dyn LlmProvider>>,
) -> Arc<dyn TagExtractor> {
    let keyword = KeywordTagExtractor::new(vocabulary);
    if config.use_llm {
        tracing::debug!(
            provider = provider.as_ref().map_or("none", |p| p.name()),
            "Using LLM-assisted tag extractor"
        );
        Arc::new(
            LlmTagExtractor::new(provider, keyword).with_max_excerpt_chars(config.max_excerpt_chars),
        )
    } else {
        tracing::debug!("Using keyword tag extractor");
        Arc::new(keyword)
    }
}
