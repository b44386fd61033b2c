//! In-memory conversation store.
//!
//! Keeps everything in a single mutex-guarded state. Multi-record writes
//! run against a copy of the state that replaces the original only when
//! every step succeeds.

use super::sqlite::acquire_lock;
use super::traits::{ConversationStore, sort_pool};
use crate::models::{Conversation, ConversationId, Message, QaPair, TagPoolEntry, TagUpdate};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct State {
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: BTreeMap<ConversationId, Vec<Message>>,
    qa_pairs: BTreeMap<ConversationId, Vec<QaPair>>,
    tag_pool: Vec<TagPoolEntry>,
}

impl State {
    fn require(&self, id: &ConversationId) -> Result<()> {
        if self.conversations.contains_key(id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("conversation {id}")))
        }
    }

    fn apply_tag_updates(&mut self, updates: &[TagUpdate]) -> Result<()> {
        let now = crate::current_timestamp();
        for update in updates {
            let conversation = self
                .conversations
                .get_mut(&update.conversation_id)
                .ok_or_else(|| Error::NotFound(format!("conversation {}", update.conversation_id)))?;
            conversation.tags.clone_from(&update.tags);
            conversation.updated_at = now;
        }
        Ok(())
    }
}

/// In-memory conversation store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    state: Mutex<State>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body` against a copy of the state and publishes it on success.
    fn transaction<T>(&self, body: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = acquire_lock(&self.state);
        let mut draft = state.clone();
        let value = body(&mut draft)?;
        *state = draft;
        Ok(value)
    }

    fn read<T>(&self, body: impl FnOnce(&State) -> T) -> T {
        body(&acquire_lock(&self.state))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.transaction(|state| {
            let created_at = state
                .conversations
                .get(&conversation.id)
                .map_or(conversation.created_at, |existing| existing.created_at);
            let mut stored = conversation.clone();
            stored.created_at = created_at;
            state.conversations.insert(stored.id.clone(), stored);
            Ok(())
        })
    }

    fn add_messages(&self, messages: &[Message]) -> Result<()> {
        self.transaction(|state| {
            for message in messages {
                state.require(&message.conversation_id)?;
                let list = state
                    .messages
                    .entry(message.conversation_id.clone())
                    .or_default();
                list.push(message.clone());
                list.sort_by_key(|m| m.position);
            }
            Ok(())
        })
    }

    fn add_qa_pairs(&self, pairs: &[QaPair]) -> Result<()> {
        self.transaction(|state| {
            for pair in pairs {
                state.require(&pair.conversation_id)?;
                let list = state
                    .qa_pairs
                    .entry(pair.conversation_id.clone())
                    .or_default();
                list.push(pair.clone());
                list.sort_by_key(|p| p.position);
            }
            Ok(())
        })
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.read(|state| state.conversations.get(id).cloned()))
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> =
            self.read(|state| state.conversations.values().cloned().collect());
        conversations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(conversations)
    }

    fn conversation_documents(&self, id: &ConversationId) -> Result<Vec<String>> {
        Ok(self.read(|state| {
            let messages: Vec<String> = state
                .messages
                .get(id)
                .map(|list| list.iter().map(|m| m.content.clone()).collect())
                .unwrap_or_default();
            if !messages.is_empty() {
                return messages;
            }
            state
                .qa_pairs
                .get(id)
                .map(|list| list.iter().map(QaPair::as_document).collect())
                .unwrap_or_default()
        }))
    }

    fn replace_tags(&self, updates: &[TagUpdate]) -> Result<()> {
        self.transaction(|state| state.apply_tag_updates(updates))
    }

    fn commit_canonical_tags(&self, updates: &[TagUpdate], pool: &[TagPoolEntry]) -> Result<()> {
        self.transaction(|state| {
            state.apply_tag_updates(updates)?;
            let mut names = std::collections::HashSet::new();
            if let Some(duplicate) = pool.iter().find(|e| !names.insert(e.canonical_name.as_str())) {
                return Err(Error::OperationFailed {
                    operation: "insert_tag_pool".to_string(),
                    cause: format!("duplicate canonical tag '{}'", duplicate.canonical_name),
                });
            }
            state.tag_pool = pool.to_vec();
            sort_pool(&mut state.tag_pool);
            Ok(())
        })
    }

    fn tag_pool(&self) -> Result<Vec<TagPoolEntry>> {
        Ok(self.read(|state| state.tag_pool.clone()))
    }
}
