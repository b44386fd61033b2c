//! Data models for memoria.
//!
//! Conversations and their documents are owned by the store; tag candidates
//! and generation results are ephemeral; tag pool entries are a materialized
//! index rebuilt on every re-tag pass.

mod conversation;
mod tag;

pub use conversation::{
    Conversation, ConversationId, ConversationSource, Message, MessageRole, QaPair,
};
pub use tag::{TagCandidate, TagGenerationResult, TagPoolEntry, TagUpdate};
