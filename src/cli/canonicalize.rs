//! Canonicalize CLI command.

use super::io_error;
use super::llm_factory::build_tagging_services;
use crate::config::MemoriaConfig;
use crate::services::tagging::CanonicalMap;
use crate::{Error, Result};
use std::io::Write;

/// Canonicalize command handler.
#[derive(Debug, Clone, Default)]
pub struct CanonicalizeCommand {
    /// Tags to canonicalize together.
    pub tags: Vec<String>,
    /// Skip LLM clustering.
    pub keyword_only: bool,
}

impl CanonicalizeCommand {
    /// Builds and prints the canonical map for the given tags.
    ///
    /// # Errors
    ///
    /// Returns an error if no tags were given.
    pub fn execute(&self, config: &MemoriaConfig, out: &mut dyn Write) -> Result<CanonicalMap> {
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return Err(Error::InvalidInput("provide at least one tag".to_string()));
        }

        let services = build_tagging_services(config, self.keyword_only);
        let map = services.canonicalizer.build_canonical_map(&tags);

        let width = tags.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        for tag in &tags {
            writeln!(out, "{tag:<width$} -> {}", map.resolve(tag)).map_err(io_error)?;
        }
        Ok(map)
    }
}
