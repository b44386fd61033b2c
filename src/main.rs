//! Binary entry point for memoria.
//!
//! This binary provides the CLI interface for conversation tagging.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use memoria::cli::{AddCommand, CanonicalizeCommand, RetagCommand, SuggestCommand, TagsCommand};
use memoria::config::MemoriaConfig;
use memoria::observability::{self, LoggingConfig};
use memoria::storage::{ConversationStore, open_store};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Memoria - automatic tagging for your AI-chat knowledge base.
#[derive(Parser)]
#[command(name = "memoria")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Add a conversation by hand.
    Add {
        /// Conversation title.
        #[arg(short, long)]
        title: String,

        /// Import source: chatgpt, claude, gemini, manual, extension, other.
        #[arg(short, long)]
        source: Option<String>,

        /// Explicit conversation id.
        #[arg(long)]
        id: Option<String>,

        /// Message text (repeatable).
        #[arg(long = "text")]
        texts: Vec<String>,

        /// File whose paragraphs become messages (repeatable).
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Re-tag the corpus after adding.
        #[arg(long)]
        retag: bool,
    },

    /// Re-tag conversations and rebuild the tag pool.
    Retag {
        /// Conversation id to re-tag (repeatable; default: all).
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Use keyword extraction only.
        #[arg(long)]
        keyword_only: bool,
    },

    /// Suggest tags for ad-hoc text without storing it.
    Suggest {
        /// Conversation title.
        #[arg(short, long, default_value = "")]
        title: String,

        /// Import source.
        #[arg(short, long)]
        source: Option<String>,

        /// Document text (repeatable).
        #[arg(long = "text")]
        texts: Vec<String>,

        /// File whose paragraphs become documents (repeatable).
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Use keyword extraction only.
        #[arg(long)]
        keyword_only: bool,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how tags canonicalize together.
    Canonicalize {
        /// Tags to canonicalize.
        #[arg(required = true)]
        tags: Vec<String>,

        /// Skip LLM clustering.
        #[arg(long)]
        keyword_only: bool,
    },

    /// List the tag pool.
    Tags {
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match MemoriaConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run_command(command: Commands, config: &MemoriaConfig) -> memoria::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Add {
            title,
            source,
            id,
            texts,
            files,
            retag,
        } => {
            let store = open(config)?;
            let conversation = AddCommand {
                title,
                source,
                id,
                texts,
                files,
            }
            .execute(store.as_ref(), &mut out)?;
            if retag {
                RetagCommand {
                    ids: vec![conversation.id.to_string()],
                    keyword_only: false,
                }
                .execute(config, store, &mut out)?;
            }
        },
        Commands::Retag { ids, keyword_only } => {
            let store = open(config)?;
            RetagCommand { ids, keyword_only }.execute(config, store, &mut out)?;
        },
        Commands::Suggest {
            title,
            source,
            texts,
            files,
            keyword_only,
            json,
        } => {
            SuggestCommand {
                title,
                source,
                texts,
                files,
                keyword_only,
                json,
            }
            .execute(config, &mut out)?;
        },
        Commands::Canonicalize { tags, keyword_only } => {
            CanonicalizeCommand { tags, keyword_only }.execute(config, &mut out)?;
        },
        Commands::Tags { json } => {
            let store = open(config)?;
            TagsCommand { json }.execute(store.as_ref(), &mut out)?;
        },
    }

    out.flush().map_err(|e| memoria::Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    })
}

fn open(config: &MemoriaConfig) -> memoria::Result<Arc<dyn ConversationStore>> {
    Ok(Arc::new(open_store(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_retag_ids() {
        let cli = Cli::try_parse_from(["memoria", "retag", "--id", "a", "--id", "b", "--keyword-only"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Retag { ref ids, keyword_only: true } if *ids == ["a", "b"]
        ));
    }

    #[test]
    fn test_canonicalize_requires_tags() {
        assert!(Cli::try_parse_from(["memoria", "canonicalize"]).is_err());
    }
}
