//! CLI command implementations.
//!
//! This module provides the command-line interface for memoria. Each
//! submodule implements one command; output goes to the writer passed in.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `add` | Store a manually entered conversation |
//! | `retag` | Re-tag conversations and rebuild the tag pool |
//! | `suggest` | Run the configured extractor on ad-hoc text |
//! | `canonicalize` | Show the canonical mapping for a set of tags |
//! | `tags` | List the tag pool |
//!
//! # Example Usage
//!
//! ```bash
//! # Add a conversation from a transcript file
//! memoria add --title "Resume review" --source chatgpt --file chat.txt
//!
//! # Re-tag everything without calling the LLM
//! memoria retag --keyword-only
//!
//! # See how tags would merge
//! memoria canonicalize "CV Tips" Resume Resumes "Curriculum Vitae Help"
//! ```
//!
//! # LLM Client Factory
//!
//! The `llm_factory` submodule builds LLM clients and tagging services from
//! configuration.

mod add;
mod canonicalize;
mod llm_factory;
mod retag;
mod suggest;
mod tags;

pub use add::AddCommand;
pub use canonicalize::CanonicalizeCommand;
pub use llm_factory::{
    TaggingServices, build_anthropic_client, build_http_config, build_llm_provider,
    build_openai_client, build_retag_service, build_tagging_services,
};
pub use retag::RetagCommand;
pub use suggest::SuggestCommand;
pub use tags::TagsCommand;

use crate::{Error, Result};
use std::path::Path;

/// Converts an output write failure.
#[allow(clippy::needless_pass_by_value)]
fn io_error(e: std::io::Error) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}

/// Reads a text file and splits it into blank-line separated paragraphs.
fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
        operation: "read_input_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    Ok(split_paragraphs(&contents))
}

fn split_paragraphs(contents: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}
