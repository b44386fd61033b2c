//! Re-tagging integration tests.
//!
//! Runs the full pipeline against a file-backed `SQLite` store:
//! - Extraction, canonicalization and tag-pool rebuild
//! - Persistence across store reopen
//! - LLM clustering composed with the local merge
//! - Keyword fallback when the model fails
//! - CLI commands wired through configuration

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use memoria::cli::{AddCommand, RetagCommand, TagsCommand};
use memoria::config::{LlmProviderKind, MemoriaConfig};
use memoria::llm::LlmProvider;
use memoria::models::{
    Conversation, ConversationId, ConversationSource, Message, MessageRole, QaPair,
    TagGenerationResult,
};
use memoria::services::tagging::{
    KeywordTagExtractor, LlmTagClusterer, LlmTagExtractor, TagCanonicalizer, TagExtractor,
    Vocabulary,
};
use memoria::{ConversationStore, RetagService, SqliteConversationStore, TagPoolEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Returns fixed tags per conversation title.
#[derive(Default)]
struct TitleExtractor {
    tags: HashMap<&'static str, Vec<&'static str>>,
}

impl TitleExtractor {
    fn with(mut self, title: &'static str, tags: &[&'static str]) -> Self {
        self.tags.insert(title, tags.to_vec());
        self
    }
}

impl TagExtractor for TitleExtractor {
    fn name(&self) -> &'static str {
        "title"
    }

    fn generate_tags(&self, conversation: &Conversation, _documents: &[String]) -> TagGenerationResult {
        let mut result = TagGenerationResult::empty(conversation.id.clone());
        result.normalized_tags = self
            .tags
            .get(conversation.title.as_str())
            .map(|tags| tags.iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        result
    }
}

/// Replies with the same text to every request.
struct FixedProvider {
    reply: Option<String>,
}

impl LlmProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn complete(&self, _prompt: &str) -> memoria::Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| memoria::Error::OperationFailed {
                operation: "complete".to_string(),
                cause: "HTTP 503".to_string(),
            })
    }
}

fn open_store(dir: &TempDir) -> Arc<SqliteConversationStore> {
    Arc::new(SqliteConversationStore::new(dir.path().join("memoria.db")).expect("open store"))
}

fn save(store: &dyn ConversationStore, title: &str) -> ConversationId {
    let conversation = Conversation::new(title, ConversationSource::ChatGpt).with_id(title);
    store.save_conversation(&conversation).unwrap();
    conversation.id
}

fn tags_of(store: &dyn ConversationStore, id: &ConversationId) -> Vec<String> {
    store.get_conversation(id).unwrap().unwrap().tags
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_variants_collapse_into_one_pool_entry() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = save(store.as_ref(), "a");
    let b = save(store.as_ref(), "b");

    let extractor = TitleExtractor::default()
        .with("a", &["Python"])
        .with("b", &["python basics"]);
    let service = RetagService::new(store.clone(), Arc::new(extractor), TagCanonicalizer::default());

    let stats = service.retag_conversations(None).unwrap();

    assert_eq!(stats.retagged, 2);
    assert_eq!(stats.pool_size, 1);
    assert_eq!(
        store.tag_pool().unwrap(),
        vec![TagPoolEntry {
            canonical_name: "Python".to_string(),
            usage_count: 2,
            aliases: vec!["Python Basics".to_string()],
        }]
    );
    assert_eq!(tags_of(store.as_ref(), &a), vec!["Python"]);
    assert_eq!(tags_of(store.as_ref(), &b), vec!["Python"]);
}

#[test]
fn test_resume_family_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        for title in ["a", "b", "c"] {
            save(store.as_ref(), title);
        }
        let extractor = TitleExtractor::default()
            .with("a", &["CV Writing", "Interviews"])
            .with("b", &["Resume Writing Tips"])
            .with("c", &["Interviewing", "Salary Negotiation"]);
        RetagService::new(store, Arc::new(extractor), TagCanonicalizer::default())
            .retag_conversations(None)
            .unwrap();
    }

    let store = open_store(&dir);
    let pool = store.tag_pool().unwrap();
    let summary: Vec<(&str, usize)> = pool
        .iter()
        .map(|e| (e.canonical_name.as_str(), e.usage_count))
        .collect();
    assert_eq!(
        summary,
        vec![("CV Writing", 2), ("Interviews", 2), ("Salary Negotiation", 1)]
    );
    assert_eq!(
        tags_of(store.as_ref(), &ConversationId::new("c")),
        vec!["Interviews", "Salary Negotiation"]
    );
}

#[test]
fn test_subset_retag_keeps_other_tags_and_counts_missing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = save(store.as_ref(), "a");
    let b = save(store.as_ref(), "b");
    store
        .replace_tags(&[memoria::models::TagUpdate::new(b.clone(), vec!["Rust".to_string()])])
        .unwrap();

    let extractor = TitleExtractor::default().with("a", &["Rust Ownership"]);
    let service = RetagService::new(store.clone(), Arc::new(extractor), TagCanonicalizer::default());
    let ids = vec![a.clone(), ConversationId::new("nope")];
    let stats = service.retag_conversations(Some(ids.as_slice())).unwrap();

    assert_eq!(stats.missing, 1);
    assert_eq!(stats.retagged, 1);
    assert_eq!(tags_of(store.as_ref(), &a), vec!["Rust"]);
    assert_eq!(tags_of(store.as_ref(), &b), vec!["Rust"]);
    assert_eq!(store.tag_pool().unwrap()[0].usage_count, 2);
}

#[test]
fn test_llm_clustering_composes_with_local_merge() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    save(store.as_ref(), "a");
    save(store.as_ref(), "b");
    save(store.as_ref(), "c");

    let extractor = TitleExtractor::default()
        .with("a", &["ML"])
        .with("b", &["Machine Learning"])
        .with("c", &["Machine Learning Basics"]);
    let clusters = FixedProvider {
        reply: Some(
            r#"{"clusters": [{"canonical": "Machine Learning", "aliases": ["ML"]}]}"#.to_string(),
        ),
    };
    let canonicalizer = TagCanonicalizer::new(Arc::new(Vocabulary::default()))
        .with_clusterer(LlmTagClusterer::new(Arc::new(clusters)));
    RetagService::new(store.clone(), Arc::new(extractor), canonicalizer)
        .retag_conversations(None)
        .unwrap();

    let pool = store.tag_pool().unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].canonical_name, "Machine Learning");
    assert_eq!(pool[0].usage_count, 3);
    assert_eq!(pool[0].aliases, vec!["ML", "Machine Learning Basics"]);
}

#[test]
fn test_failed_clustering_falls_back_to_local_merge() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    save(store.as_ref(), "a");
    save(store.as_ref(), "b");

    let extractor = TitleExtractor::default()
        .with("a", &["ML"])
        .with("b", &["Machine Learning"]);
    let canonicalizer = TagCanonicalizer::new(Arc::new(Vocabulary::default()))
        .with_clusterer(LlmTagClusterer::new(Arc::new(FixedProvider { reply: None })));
    let stats = RetagService::new(store.clone(), Arc::new(extractor), canonicalizer)
        .retag_conversations(None)
        .unwrap();

    assert_eq!(stats.pool_size, 2);
}

#[test]
fn test_failing_model_falls_back_to_keywords() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let id = save(store.as_ref(), "Sourdough starter");
    store
        .add_qa_pairs(&[QaPair::new(
            id.clone(),
            "Why is my sourdough starter not rising?",
            "Feed the starter twice daily with flour and water at room temperature.",
            0,
        )])
        .unwrap();

    let keyword = KeywordTagExtractor::new(Arc::new(Vocabulary::default()));
    let expected = keyword
        .generate_tags(
            &store.get_conversation(&id).unwrap().unwrap(),
            &store.conversation_documents(&id).unwrap(),
        )
        .normalized_tags;
    let extractor = LlmTagExtractor::new(Some(Arc::new(FixedProvider { reply: None })), keyword);

    let stats = RetagService::new(store.clone(), Arc::new(extractor), TagCanonicalizer::default())
        .retag_conversations(None)
        .unwrap();

    assert_eq!(stats.untagged, 0);
    let tags = tags_of(store.as_ref(), &id);
    assert!(!tags.is_empty());
    assert!(tags.iter().any(|t| t == "Sourdough"));
    assert!(tags.iter().all(|t| expected.contains(t)));
}

#[test]
fn test_model_tags_are_stored() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let id = save(store.as_ref(), "Trip planning");
    store
        .add_messages(&[Message::new(
            id.clone(),
            MessageRole::User,
            "Plan a week in Kyoto in autumn",
            0,
        )])
        .unwrap();

    let provider = FixedProvider {
        reply: Some(
            r#"{"summary": "Planning a Kyoto trip.", "tags": [
                {"name": "travel planning", "rationale": "itinerary", "confidence": 0.9},
                {"label": "Kyoto", "reason": "destination"},
                {"name": "Travel-Planning"}
            ]}"#
            .to_string(),
        ),
    };
    let extractor = LlmTagExtractor::new(
        Some(Arc::new(provider)),
        KeywordTagExtractor::new(Arc::new(Vocabulary::default())),
    );
    RetagService::new(store.clone(), Arc::new(extractor), TagCanonicalizer::default())
        .retag_conversations(None)
        .unwrap();

    assert_eq!(tags_of(store.as_ref(), &id), vec!["Travel Planning", "Kyoto"]);
}

// ============================================================================
// CLI commands
// ============================================================================

#[test]
fn test_cli_add_retag_and_list() {
    let dir = TempDir::new().unwrap();
    let mut config = MemoriaConfig::default().with_data_dir(dir.path());
    config.llm.provider = LlmProviderKind::None;
    let store: Arc<dyn ConversationStore> = Arc::new(memoria::storage::open_store(&config).unwrap());

    let transcript = dir.path().join("chat.txt");
    std::fs::write(
        &transcript,
        "How do I write a resume for a data science job?\n\nLead with data science projects and quantify results.\n",
    )
    .unwrap();

    let mut out = Vec::new();
    AddCommand {
        title: "Data science resume".to_string(),
        source: Some("chatgpt".to_string()),
        id: Some("conv-1".to_string()),
        texts: Vec::new(),
        files: vec![transcript],
    }
    .execute(store.as_ref(), &mut out)
    .unwrap();

    let stats = RetagCommand {
        ids: Vec::new(),
        keyword_only: false,
    }
    .execute(&config, Arc::clone(&store), &mut out)
    .unwrap();
    assert_eq!(stats.retagged, 1);
    assert!(stats.pool_size > 0);

    let pool = TagsCommand { json: false }.execute(store.as_ref(), &mut out).unwrap();
    assert_eq!(pool.len(), stats.pool_size);
    assert!(pool.iter().all(|entry| entry.usage_count == 1));

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Added conversation conv-1 (2 messages)\n"));
    assert!(text.contains("Resume"));
    assert!(dir.path().join("memoria.db").exists());
}
