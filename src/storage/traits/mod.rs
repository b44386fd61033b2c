//! Conversation store trait.

use crate::Result;
use crate::models::{Conversation, ConversationId, Message, QaPair, TagPoolEntry, TagUpdate};

/// Trait for conversation store backends.
///
/// The store is the authoritative source for conversations, their
/// documents, and the materialized tag pool. Every write method is atomic:
/// it either applies completely or leaves previously committed state
/// untouched.
pub trait ConversationStore: Send + Sync {
    /// The backend name, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Inserts or replaces a conversation record, including its tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Appends messages to their conversations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if a referenced conversation does
    /// not exist, or an error if the write fails. Nothing is written on error.
    fn add_messages(&self, messages: &[Message]) -> Result<()>;

    /// Appends question/answer pairs to their conversations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if a referenced conversation does
    /// not exist, or an error if the write fails. Nothing is written on error.
    fn add_qa_pairs(&self, pairs: &[QaPair]) -> Result<()>;

    /// Retrieves a conversation by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Lists all conversations, oldest first (ties by ID).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Returns the documents of a conversation.
    ///
    /// Messages in position order when any exist; otherwise question/answer
    /// pairs rendered as `"{question}\n\n{answer}"`; otherwise empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn conversation_documents(&self, id: &ConversationId) -> Result<Vec<String>>;

    /// Replaces the tags of several conversations in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if any conversation does not exist,
    /// or an error if the transaction fails. Nothing is written on error.
    fn replace_tags(&self, updates: &[TagUpdate]) -> Result<()>;

    /// Applies tag updates and rebuilds the tag pool in one transaction.
    ///
    /// The pool is cleared and replaced by `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if any conversation does not exist,
    /// or an error if the transaction fails. Nothing is written on error.
    fn commit_canonical_tags(&self, updates: &[TagUpdate], pool: &[TagPoolEntry]) -> Result<()>;

    /// Reads the tag pool, most used first (ties by name).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn tag_pool(&self) -> Result<Vec<TagPoolEntry>>;

    /// Returns the number of conversations.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn count(&self) -> Result<usize> {
        Ok(self.list_conversations()?.len())
    }
}

/// Sorts pool entries most used first, ties by canonical name.
pub(crate) fn sort_pool(pool: &mut [TagPoolEntry]) {
    pool.sort_by(|a, b| {
        b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| a.canonical_name.cmp(&b.canonical_name))
    });
}
