//! Corpus re-tagging.
//!
//! Regenerates tags for a set of conversations, then canonicalizes the
//! whole corpus and rebuilds the tag pool. The two write phases are
//! separate store transactions and always run in that order.

use crate::Result;
use crate::models::{Conversation, ConversationId, TagPoolEntry, TagUpdate};
use crate::services::tagging::{CanonicalMap, TagCanonicalizer, TagExtractor, dedupe_key};
use crate::storage::{ConversationStore, sort_pool};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, instrument};

/// Service that re-tags conversations and maintains the tag pool.
pub struct RetagService {
    store: Arc<dyn ConversationStore>,
    extractor: Arc<dyn TagExtractor>,
    canonicalizer: TagCanonicalizer,
}

impl RetagService {
    /// Creates a new re-tag service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        extractor: Arc<dyn TagExtractor>,
        canonicalizer: TagCanonicalizer,
    ) -> Self {
        Self {
            store,
            extractor,
            canonicalizer,
        }
    }

    /// Returns the store this service writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Re-tags `ids` (or every conversation when `None`) and rebuilds the
    /// tag pool from the whole corpus.
    ///
    /// Unknown ids are counted as missing and skipped. Extraction never
    /// fails; store failures abort the run, leaving earlier commits intact.
    ///
    /// # Errors
    ///
    /// Returns an error if any store read or transaction fails.
    #[instrument(
        name = "memoria.retag",
        skip(self, ids),
        fields(
            extractor = self.extractor.name(),
            backend = self.store.name(),
            requested = ids.map_or(0, <[ConversationId]>::len)
        )
    )]
    pub fn retag_conversations(&self, ids: Option<&[ConversationId]>) -> Result<RetagStats> {
        let start = Instant::now();
        let result = self.run(ids);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("retag_runs_total", "status" => status).increment(1);
        metrics::histogram!("retag_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(stats) => tracing::info!(
                retagged = stats.retagged,
                missing = stats.missing,
                untagged = stats.untagged,
                canonical_updates = stats.canonical_updates,
                pool_size = stats.pool_size,
                "Re-tag complete"
            ),
            Err(e) => tracing::error!(error = %e, "Re-tag failed"),
        }
        result
    }

    fn run(&self, ids: Option<&[ConversationId]>) -> Result<RetagStats> {
        let mut stats = RetagStats::default();

        let targets = self.load_targets(ids, &mut stats)?;

        {
            let _span = info_span!("memoria.retag.extract", conversations = targets.len()).entered();
            let updates = self.extract_tags(&targets, &mut stats)?;
            if !updates.is_empty() {
                self.store.replace_tags(&updates)?;
            }
        }

        let _span = info_span!("memoria.retag.canonicalize").entered();
        let conversations = self.store.list_conversations()?;
        let all_tags: Vec<&str> = conversations
            .iter()
            .flat_map(|c| c.tags.iter().map(String::as_str))
            .collect();
        let map = self.canonicalizer.build_canonical_map(&all_tags);

        let (updates, canonical_tags) = canonical_updates(&conversations, &map);
        let pool = build_pool(&canonical_tags, &map);
        self.store.commit_canonical_tags(&updates, &pool)?;

        stats.canonical_updates = updates.len();
        stats.pool_size = pool.len();
        Ok(stats)
    }

    fn load_targets(
        &self,
        ids: Option<&[ConversationId]>,
        stats: &mut RetagStats,
    ) -> Result<Vec<Conversation>> {
        let Some(ids) = ids else {
            let all = self.store.list_conversations()?;
            stats.requested = all.len();
            return Ok(all);
        };

        stats.requested = ids.len();
        let mut seen = BTreeSet::new();
        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.store.get_conversation(id)? {
                Some(conversation) => targets.push(conversation),
                None => {
                    tracing::debug!(conversation_id = %id, "Skipping unknown conversation");
                    stats.missing += 1;
                },
            }
        }
        Ok(targets)
    }

    fn extract_tags(
        &self,
        targets: &[Conversation],
        stats: &mut RetagStats,
    ) -> Result<Vec<TagUpdate>> {
        let mut updates = Vec::with_capacity(targets.len());
        for conversation in targets {
            let documents = self.store.conversation_documents(&conversation.id)?;
            let result = self.extractor.generate_tags(conversation, &documents);
            tracing::debug!(
                conversation_id = %conversation.id,
                documents = documents.len(),
                tag_count = result.normalized_tags.len(),
                "Generated tags"
            );
            if result.is_empty() {
                stats.untagged += 1;
            }
            stats.retagged += 1;
            updates.push(TagUpdate::new(
                conversation.id.clone(),
                result.normalized_tags,
            ));
        }
        Ok(updates)
    }
}

/// Applies `map` to every conversation.
///
/// Returns the updates for conversations whose tag keys changed, plus the
/// canonical tag list of every conversation. Stored labels whose keys already
/// match are left alone, so a stored tag may differ from its pool entry in
/// case or punctuation only ("python" against "Python").
fn canonical_updates(
    conversations: &[Conversation],
    map: &CanonicalMap,
) -> (Vec<TagUpdate>, Vec<Vec<String>>) {
    let mut updates = Vec::new();
    let mut canonical_tags = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let canonical = map.canonicalize_tags(&conversation.tags);
        if key_set(&canonical) != key_set(&conversation.tags) {
            updates.push(TagUpdate::new(conversation.id.clone(), canonical.clone()));
        }
        canonical_tags.push(canonical);
    }
    (updates, canonical_tags)
}

fn key_set(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .filter(|tag| !tag.trim().is_empty())
        .map(|tag| dedupe_key(tag))
        .collect()
}

/// Builds the tag pool from per-conversation canonical tag lists.
fn build_pool(canonical_tags: &[Vec<String>], map: &CanonicalMap) -> Vec<TagPoolEntry> {
    let mut entries: BTreeMap<String, TagPoolEntry> = BTreeMap::new();
    for tags in canonical_tags {
        // Lists are already deduplicated by key, so each hit is one conversation.
        for tag in tags {
            entries
                .entry(dedupe_key(tag))
                .or_insert_with(|| TagPoolEntry {
                    canonical_name: tag.clone(),
                    usage_count: 0,
                    aliases: map.aliases_of(tag),
                })
                .usage_count += 1;
        }
    }
    let mut pool: Vec<TagPoolEntry> = entries.into_values().collect();
    sort_pool(&mut pool);
    pool
}

/// Statistics from a re-tag run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetagStats {
    /// Conversations asked for (all conversations when no ids were given).
    pub requested: usize,
    /// Requested ids not found in the store.
    pub missing: usize,
    /// Conversations whose tags were regenerated.
    pub retagged: usize,
    /// Regenerated conversations that ended up with no tags.
    pub untagged: usize,
    /// Conversations rewritten by canonicalization.
    pub canonical_updates: usize,
    /// Entries in the rebuilt tag pool.
    pub pool_size: usize,
}

impl RetagStats {
    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.requested == 0 && self.pool_size == 0 {
            return "No conversations to tag".to_string();
        }
        format!(
            "Requested: {}, Missing: {}, Retagged: {}, Untagged: {}, Canonicalized: {}, Pool: {}",
            self.requested,
            self.missing,
            self.retagged,
            self.untagged,
            self.canonical_updates,
            self.pool_size
        )
    }
}
