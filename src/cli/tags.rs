//! Tags CLI command.

use super::io_error;
use crate::models::TagPoolEntry;
use crate::storage::ConversationStore;
use crate::{Error, Result};
use std::io::Write;

/// Tags command handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagsCommand {
    /// Print the pool as JSON.
    pub json: bool,
}

impl TagsCommand {
    /// Prints the tag pool, most used first.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be read.
    pub fn execute(&self, store: &dyn ConversationStore, out: &mut dyn Write) -> Result<Vec<TagPoolEntry>> {
        let pool = store.tag_pool()?;

        if self.json {
            let rendered = serde_json::to_string_pretty(&pool).map_err(|e| Error::OperationFailed {
                operation: "serialize_tag_pool".to_string(),
                cause: e.to_string(),
            })?;
            writeln!(out, "{rendered}").map_err(io_error)?;
            return Ok(pool);
        }

        if pool.is_empty() {
            writeln!(out, "Tag pool is empty; run `memoria retag` first").map_err(io_error)?;
            return Ok(pool);
        }
        for entry in &pool {
            let written = if entry.aliases.is_empty() {
                writeln!(out, "{:>5}  {}", entry.usage_count, entry.canonical_name)
            } else {
                writeln!(
                    out,
                    "{:>5}  {}  (aliases: {})",
                    entry.usage_count,
                    entry.canonical_name,
                    entry.aliases.join(", ")
                )
            };
            written.map_err(io_error)?;
        }
        Ok(pool)
    }
}
