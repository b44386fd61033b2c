//! Retag CLI command.

use super::io_error;
use super::llm_factory::build_retag_service;
use crate::Result;
use crate::config::MemoriaConfig;
use crate::models::ConversationId;
use crate::services::RetagStats;
use crate::storage::ConversationStore;
use std::io::Write;
use std::sync::Arc;

/// Retag command handler.
#[derive(Debug, Clone, Default)]
pub struct RetagCommand {
    /// Conversation ids to re-tag; all conversations when empty.
    pub ids: Vec<String>,
    /// Use the keyword extractor and skip LLM clustering.
    pub keyword_only: bool,
}

impl RetagCommand {
    /// Re-tags conversations and rebuilds the tag pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn execute(
        &self,
        config: &MemoriaConfig,
        store: Arc<dyn ConversationStore>,
        out: &mut dyn Write,
    ) -> Result<RetagStats> {
        let service = build_retag_service(config, store, self.keyword_only);
        let ids: Vec<ConversationId> = self.ids.iter().map(|id| ConversationId::new(id.trim())).collect();
        let stats = if ids.is_empty() {
            service.retag_conversations(None)?
        } else {
            service.retag_conversations(Some(ids.as_slice()))?
        };
        writeln!(out, "{}", stats.summary()).map_err(io_error)?;
        Ok(stats)
    }
}
