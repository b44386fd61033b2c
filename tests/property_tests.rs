//! Property-based tests for tagging invariants.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Canonical maps are a pure function of the tag multiset
//! - Canonical labels are fixed points of a rebuilt map
//! - Extractors respect their tag caps
//! - A failing model is indistinguishable from keyword extraction

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use memoria::llm::LlmProvider;
use memoria::models::{Conversation, ConversationSource};
use memoria::services::tagging::{
    KeywordTagExtractor, LlmTagExtractor, TagCanonicalizer, TagExtractor, Vocabulary,
    normalize_key, tokenize,
};
use proptest::prelude::*;
use std::sync::Arc;

const WORDS: &[&str] = &[
    "resume", "resumes", "cv", "writing", "tips", "python", "basics", "rust", "ownership",
    "machine", "learning", "ml", "interview", "interviews", "data", "science", "guide", "help",
    "kubernetes", "k8s", "networking", "ai", "of", "the",
];

fn label() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 1..4).prop_map(|words| words.join(" "))
}

fn labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(label(), 0..12)
}

fn sentence() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,10}", 0..30).prop_map(|words| words.join(" "))
}

struct FailingProvider;

impl LlmProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn complete(&self, _prompt: &str) -> memoria::Result<String> {
        Err(memoria::Error::OperationFailed {
            operation: "complete".to_string(),
            cause: "service unavailable".to_string(),
        })
    }
}

/// Replies with a fixed list of tags regardless of input.
struct ChattyProvider {
    reply: String,
}

impl LlmProvider for ChattyProvider {
    fn name(&self) -> &'static str {
        "chatty"
    }

    fn complete(&self, _prompt: &str) -> memoria::Result<String> {
        Ok(self.reply.clone())
    }
}

fn keyword() -> KeywordTagExtractor {
    KeywordTagExtractor::new(Arc::new(Vocabulary::default()))
}

proptest! {
    /// Property: the same input yields the same map.
    #[test]
    fn prop_canonical_map_is_deterministic(tags in labels()) {
        let canonicalizer = TagCanonicalizer::default();
        prop_assert_eq!(
            canonicalizer.build_canonical_map(&tags),
            canonicalizer.build_canonical_map(&tags)
        );
    }

    /// Property: order and multiplicity of the input do not matter.
    #[test]
    fn prop_canonical_map_ignores_order_and_duplicates(tags in labels()) {
        let canonicalizer = TagCanonicalizer::default();
        let mut shuffled: Vec<String> = tags.iter().rev().cloned().collect();
        shuffled.extend(tags.iter().cloned());
        prop_assert_eq!(
            canonicalizer.build_canonical_map(&tags),
            canonicalizer.build_canonical_map(&shuffled)
        );
    }

    /// Property: every input tag with a key resolves to a canonical label.
    #[test]
    fn prop_canonical_map_covers_input(tags in labels()) {
        let map = TagCanonicalizer::default().build_canonical_map(&tags);
        let canonical = map.canonical_labels();
        for tag in &tags {
            let resolved = map.get(tag);
            prop_assert!(resolved.is_some(), "{} missing", tag);
            prop_assert!(canonical.contains(resolved.unwrap()));
        }
    }

    /// Property: canonical labels map to themselves when canonicalized again.
    #[test]
    fn prop_canonical_labels_are_fixed_points(tags in labels()) {
        let canonicalizer = TagCanonicalizer::default();
        let map = canonicalizer.build_canonical_map(&tags);
        let canonical: Vec<String> = map.canonical_labels().into_iter().map(str::to_string).collect();
        let rebuilt = canonicalizer.build_canonical_map(&canonical);
        for label in &canonical {
            prop_assert_eq!(rebuilt.get(label), Some(label.as_str()));
        }
    }

    /// Property: canonicalizing a tag list twice changes nothing the second time.
    #[test]
    fn prop_canonicalize_tags_is_idempotent(tags in labels()) {
        let map = TagCanonicalizer::default().build_canonical_map(&tags);
        let once = map.canonicalize_tags(&tags);
        prop_assert_eq!(map.canonicalize_tags(&once), once);
    }

    /// Property: the keyword extractor never emits more than five tags.
    #[test]
    fn prop_keyword_cap(title in sentence(), docs in prop::collection::vec(sentence(), 0..5)) {
        let conversation = Conversation::new(title, ConversationSource::Manual);
        let result = keyword().generate_tags(&conversation, &docs);
        prop_assert!(result.raw_tags.len() <= 5);
        prop_assert_eq!(result.raw_tags.len(), result.normalized_tags.len());
    }

    /// Property: the LLM extractor never emits more than six normalized tags.
    #[test]
    fn prop_llm_cap(names in prop::collection::vec(label(), 1..12), title in sentence()) {
        let items: Vec<serde_json::Value> = names
            .iter()
            .map(|name| serde_json::json!({ "name": name, "confidence": 0.9 }))
            .collect();
        let provider = ChattyProvider {
            reply: serde_json::json!({ "summary": "s", "tags": items }).to_string(),
        };
        let extractor = LlmTagExtractor::new(Some(Arc::new(provider)), keyword());
        let conversation = Conversation::new(title, ConversationSource::Manual);
        let result = extractor.generate_tags(&conversation, &["some content here".to_string()]);
        prop_assert!(result.normalized_tags.len() <= 6);
        prop_assert!(!result.normalized_tags.is_empty());
    }

    /// Property: a failing model yields exactly the keyword result.
    #[test]
    fn prop_fallback_is_transparent(title in sentence(), docs in prop::collection::vec(sentence(), 0..4)) {
        let conversation = Conversation::new(title, ConversationSource::Manual);
        let extractor = LlmTagExtractor::new(Some(Arc::new(FailingProvider)), keyword());
        let via_llm = extractor.generate_tags(&conversation, &docs);
        let direct = keyword().generate_tags(&conversation, &docs);
        prop_assert_eq!(via_llm, direct);
    }

    /// Property: tokens respect the minimum length and are lowercase.
    #[test]
    fn prop_tokens_are_normalized(text in "[A-Za-z0-9 .,!?-]{0,200}") {
        for token in tokenize(&text, &Vocabulary::default()) {
            prop_assert!(token.chars().count() >= 3);
            prop_assert_eq!(token.to_lowercase(), token.clone());
            prop_assert_eq!(normalize_key(&token), token);
        }
    }
}

#[test]
fn test_empty_input_yields_empty_result() {
    for docs in [Vec::new(), vec![String::new()], vec!["  ".to_string()]] {
        let conversation = Conversation::new("", ConversationSource::Manual);
        let result = keyword().generate_tags(&conversation, &docs);
        assert!(result.raw_tags.is_empty());
        assert!(result.normalized_tags.is_empty());
    }
}
