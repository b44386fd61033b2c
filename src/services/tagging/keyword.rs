//! Keyword tag extraction.
//!
//! Scores tokens across the conversation's title and documents with a
//! smoothed TF-IDF variant and keeps the top few as tags. Deterministic,
//! local, and always available; it is also the fallback for the
//! LLM-assisted extractor.

use super::tokenizer::tokenize;
use super::{TagExtractor, Vocabulary, format_label};
use crate::models::{Conversation, ConversationId, TagCandidate, TagGenerationResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Flat score bonus for tokens that appear in the title.
const TITLE_BONUS: f64 = 0.1;

/// Keyword extractor using corpus-local TF-IDF.
#[derive(Debug, Clone)]
pub struct KeywordTagExtractor {
    vocabulary: Arc<Vocabulary>,
    max_tags: usize,
}

impl KeywordTagExtractor {
    /// Default number of tags emitted.
    pub const DEFAULT_MAX_TAGS: usize = 5;

    /// Confidence assigned to every keyword candidate.
    pub const CONFIDENCE: f32 = 0.4;

    /// Rationale attached to every keyword candidate.
    pub const RATIONALE: &'static str = "Keyword importance";

    /// Creates a new keyword extractor.
    #[must_use]
    pub const fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            max_tags: Self::DEFAULT_MAX_TAGS,
        }
    }

    /// Extracts tags from a title and its documents.
    ///
    /// Returns an empty result when neither the title nor any document
    /// yields a token.
    #[must_use]
    pub fn extract(
        &self,
        conversation_id: ConversationId,
        title: &str,
        documents: &[String],
    ) -> TagGenerationResult {
        let corpus: Vec<Vec<String>> = std::iter::once(title)
            .chain(documents.iter().map(String::as_str))
            .map(|text| tokenize(text, &self.vocabulary))
            .filter(|tokens| !tokens.is_empty())
            .collect();

        if corpus.is_empty() {
            return TagGenerationResult::empty(conversation_id);
        }

        let title_tokens: HashSet<String> = tokenize(title, &self.vocabulary).into_iter().collect();

        let raw_tags: Vec<TagCandidate> = rank_tokens(&corpus, &title_tokens)
            .into_iter()
            .take(self.max_tags)
            .map(|(token, _)| TagCandidate {
                name: format_label(token),
                confidence: Self::CONFIDENCE,
                rationale: Some(Self::RATIONALE.to_string()),
            })
            .collect();

        let normalized_tags = raw_tags.iter().map(|tag| tag.name.clone()).collect();

        TagGenerationResult {
            conversation_id,
            raw_tags,
            normalized_tags,
            summary: None,
        }
    }
}

impl TagExtractor for KeywordTagExtractor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn generate_tags(
        &self,
        conversation: &Conversation,
        documents: &[String],
    ) -> TagGenerationResult {
        metrics::counter!("tagging_requests_total", "extractor" => "keyword").increment(1);
        self.extract(conversation.id.clone(), &conversation.title, documents)
    }
}

/// Scores each distinct token and returns them best first.
///
/// `score = tf / total_tokens * (ln((n + 1) / (df + 1)) + 1)`, plus a flat
/// bonus for title tokens. The sort is stable, so ties keep first-seen order.
#[allow(clippy::cast_precision_loss)]
fn rank_tokens<'a>(
    corpus: &'a [Vec<String>],
    title_tokens: &HashSet<String>,
) -> Vec<(&'a str, f64)> {
    let mut order: Vec<&str> = Vec::new();
    let mut term_frequency: HashMap<&str, usize> = HashMap::new();
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();

    for document in corpus {
        let mut seen: HashSet<&str> = HashSet::new();
        for token in document {
            let count = term_frequency.entry(token.as_str()).or_insert(0);
            if *count == 0 {
                order.push(token.as_str());
            }
            *count += 1;
            if seen.insert(token.as_str()) {
                *document_frequency.entry(token.as_str()).or_insert(0) += 1;
            }
        }
    }

    let total_tokens = corpus.iter().map(Vec::len).sum::<usize>() as f64;
    let document_count = corpus.len() as f64;

    let mut scored: Vec<(&str, f64)> = order
        .into_iter()
        .map(|token| {
            let tf = term_frequency.get(token).copied().unwrap_or(0) as f64;
            let df = document_frequency.get(token).copied().unwrap_or(0) as f64;
            let idf = ((document_count + 1.0) / (df + 1.0)).ln() + 1.0;
            let bonus = if title_tokens.contains(token) {
                TITLE_BONUS
            } else {
                0.0
            };
            (token, (tf / total_tokens).mul_add(idf, bonus))
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}
