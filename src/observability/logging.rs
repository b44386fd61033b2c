//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Default filter directive.
const DEFAULT_FILTER: &str = "memoria=info";

/// Filter directive used with `--verbose`.
const VERBOSE_FILTER: &str = "memoria=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the logging configuration from config-file settings.
    ///
    /// The filter comes from `MEMORIA_LOG`, then `RUST_LOG`, then the
    /// default for the verbosity level.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let env_filter = std::env::var("MEMORIA_LOG")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok());
        Self::resolve(settings, verbose, env_filter)
    }

    fn resolve(settings: &LoggingSettings, verbose: bool, env_filter: Option<String>) -> Self {
        let format = settings.format.as_deref().map_or(LogFormat::default(), |raw| {
            LogFormat::parse(raw).unwrap_or_else(|| {
                tracing::warn!(format = raw, "Unknown log format, using pretty");
                LogFormat::Pretty
            })
        });

        let filter = match env_filter.filter(|f| !f.trim().is_empty()) {
            Some(directive) if !verbose => directive,
            _ if verbose => VERBOSE_FILTER.to_string(),
            _ => DEFAULT_FILTER.to_string(),
        };

        Self {
            format,
            filter,
            file: settings.file.clone(),
        }
    }
}
