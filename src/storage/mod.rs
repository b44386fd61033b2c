//! Conversation storage.
//!
//! The [`ConversationStore`] trait is the only thing services depend on.
//! Two backends implement it:
//! - [`SqliteConversationStore`]: durable, file-backed (or in-memory) `SQLite`
//! - [`InMemoryConversationStore`]: process-local, for tests and embedding

#![allow(clippy::significant_drop_tightening)]

mod memory;
pub mod sqlite;
mod traits;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use traits::ConversationStore;
pub(crate) use traits::sort_pool;

use crate::Result;
use crate::config::MemoriaConfig;

/// Opens the `SQLite` store at the configured database path.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or initialized.
pub fn open_store(config: &MemoriaConfig) -> Result<SqliteConversationStore> {
    let path = config.db_path();
    tracing::debug!(path = %path.display(), "Opening conversation store");
    SqliteConversationStore::new(path)
}
