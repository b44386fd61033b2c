//! Suggest CLI command.
//!
//! Runs the configured extractor over ad-hoc text without touching the
//! store. Useful for checking provider setup and prompt behavior.

use super::llm_factory::build_tagging_services;
use super::{io_error, read_paragraphs};
use crate::config::MemoriaConfig;
use crate::models::{Conversation, ConversationSource, TagGenerationResult};
use crate::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

/// Suggest command handler.
#[derive(Debug, Clone, Default)]
pub struct SuggestCommand {
    /// Conversation title.
    pub title: String,
    /// Import source name.
    pub source: Option<String>,
    /// Inline documents.
    pub texts: Vec<String>,
    /// Files whose paragraphs become documents.
    pub files: Vec<PathBuf>,
    /// Use the keyword extractor only.
    pub keyword_only: bool,
    /// Print the result as JSON.
    pub json: bool,
}

impl SuggestCommand {
    /// Generates and prints tags.
    ///
    /// # Errors
    ///
    /// Returns an error if no input was given or a file cannot be read.
    pub fn execute(&self, config: &MemoriaConfig, out: &mut dyn Write) -> Result<TagGenerationResult> {
        let mut documents: Vec<String> = self
            .texts
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        for file in &self.files {
            documents.extend(read_paragraphs(file)?);
        }
        if self.title.trim().is_empty() && documents.is_empty() {
            return Err(Error::InvalidInput(
                "provide a title, --text or --file".to_string(),
            ));
        }

        let source = self
            .source
            .as_deref()
            .map_or(ConversationSource::Manual, ConversationSource::parse);
        let conversation = Conversation::new(self.title.trim(), source);

        let services = build_tagging_services(config, self.keyword_only);
        let result = services.extractor.generate_tags(&conversation, &documents);

        if self.json {
            let rendered = serde_json::to_string_pretty(&result).map_err(|e| Error::OperationFailed {
                operation: "serialize_tags".to_string(),
                cause: e.to_string(),
            })?;
            writeln!(out, "{rendered}").map_err(io_error)?;
        } else {
            render_text(&result, out)?;
        }
        Ok(result)
    }
}

fn render_text(result: &TagGenerationResult, out: &mut dyn Write) -> Result<()> {
    if let Some(summary) = &result.summary {
        writeln!(out, "Summary: {summary}").map_err(io_error)?;
    }
    if result.is_empty() {
        writeln!(out, "No tags").map_err(io_error)?;
        return Ok(());
    }
    writeln!(out, "Tags: {}", result.normalized_tags.join(", ")).map_err(io_error)?;
    for candidate in &result.raw_tags {
        let rationale = candidate.rationale.as_deref().unwrap_or("-");
        writeln!(
            out,
            "  {:<24} {:.2}  {rationale}",
            candidate.name, candidate.confidence
        )
        .map_err(io_error)?;
    }
    Ok(())
}
