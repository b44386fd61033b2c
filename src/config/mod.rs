//! Configuration management.
//!
//! Configuration comes from a TOML file (explicit path, `MEMORIA_CONFIG_PATH`,
//! or the platform config directory) with environment variable overrides
//! applied on top. Every setting has a default, so no file is required.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Matches `${VAR}` references.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex: env reference")
});

/// Main configuration for memoria.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoriaConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Explicit database path; defaults to `<data_dir>/memoria.db`.
    pub db_path: Option<PathBuf>,
    /// Tagging behavior.
    pub tagging: TaggingConfig,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Logging output.
    pub logging: LoggingSettings,
}

/// Tagging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggingConfig {
    /// Use the LLM-assisted extractor (falls back to keywords per call).
    pub use_llm: bool,
    /// Ask the LLM for a clustering head start during canonicalization.
    pub llm_clustering: bool,
    /// Excerpt length sent to the LLM, in characters.
    pub max_excerpt_chars: usize,
    /// Labels per clustering request.
    pub cluster_batch_size: usize,
    /// Stop words added to the built-in list.
    pub extra_stop_words: Vec<String>,
    /// Filler words added to the built-in list.
    pub extra_filler_words: Vec<String>,
    /// Short tokens allowed to anchor a merge.
    pub special_short_tokens: Vec<String>,
    /// Synonyms added to (or overriding) the built-in table.
    pub synonyms: HashMap<String, String>,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            llm_clustering: false,
            max_excerpt_chars: crate::services::tagging::DEFAULT_MAX_EXCERPT_CHARS,
            cluster_batch_size: crate::services::tagging::DEFAULT_CLUSTER_BATCH_SIZE,
            extra_stop_words: Vec::new(),
            extra_filler_words: Vec::new(),
            special_short_tokens: Vec::new(),
            synonyms: HashMap::new(),
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmConfig {
    /// Provider selection.
    pub provider: LlmProviderKind,
    /// Model name.
    pub model: Option<String>,
    /// API key, after `${VAR}` expansion.
    pub api_key: Option<String>,
    /// Base URL for the provider.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    /// `OpenAI` or any Chat Completions compatible endpoint.
    #[default]
    OpenAi,
    /// Anthropic Claude.
    Anthropic,
    /// No provider; tagging is keyword-only.
    None,
}

impl LlmProviderKind {
    /// Parses a provider string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for unknown providers.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "none" | "off" | "" => Ok(Self::None),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown LLM provider '{other}' (expected openai, anthropic or none)"
            ))),
        }
    }

    /// Returns the provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::None => "none",
        }
    }
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub db_path: Option<String>,
    /// Tagging section.
    pub tagging: Option<ConfigFileTagging>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Tagging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileTagging {
    /// Use the LLM-assisted extractor.
    pub use_llm: Option<bool>,
    /// Enable LLM clustering.
    pub llm_clustering: Option<bool>,
    /// Excerpt length.
    pub max_excerpt_chars: Option<usize>,
    /// Clustering batch size.
    pub cluster_batch_size: Option<usize>,
    /// Extra stop words.
    #[serde(default)]
    pub extra_stop_words: Vec<String>,
    /// Extra filler words.
    #[serde(default)]
    pub extra_filler_words: Vec<String>,
    /// Special short tokens.
    #[serde(default)]
    pub special_short_tokens: Vec<String>,
    /// Synonym table.
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key, may reference `${VAR}`.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

impl Default for MemoriaConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            tagging: TaggingConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl MemoriaConfig {
    /// Database file name inside the data directory.
    pub const DB_FILE_NAME: &'static str = "memoria.db";

    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration for the CLI.
    ///
    /// Uses `explicit` if given, else `MEMORIA_CONFIG_PATH`, else the
    /// default location; then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed,
    /// or an override holds an invalid value.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        let from_env = std::env::var_os("MEMORIA_CONFIG_PATH").map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.with_env_overrides()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory
    /// (`<config_dir>/memoria/config.toml`).
    ///
    /// Returns defaults if no file exists or it cannot be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs.config_dir().join("memoria").join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            Self::default()
        })
    }

    /// Converts a `ConfigFile` to `MemoriaConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = expand_path(&data_dir);
        }
        config.db_path = file.db_path.as_deref().map(expand_path);

        if let Some(tagging) = file.tagging {
            if let Some(v) = tagging.use_llm {
                config.tagging.use_llm = v;
            }
            if let Some(v) = tagging.llm_clustering {
                config.tagging.llm_clustering = v;
            }
            if let Some(v) = tagging.max_excerpt_chars {
                config.tagging.max_excerpt_chars = v;
            }
            if let Some(v) = tagging.cluster_batch_size {
                config.tagging.cluster_batch_size = v.max(1);
            }
            config.tagging.extra_stop_words = tagging.extra_stop_words;
            config.tagging.extra_filler_words = tagging.extra_filler_words;
            config.tagging.special_short_tokens = tagging.special_short_tokens;
            config.tagging.synonyms = tagging.synonyms;
        }

        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProviderKind::parse(&provider)?;
            }
            config.llm.model = llm.model.filter(|m| !m.trim().is_empty());
            config.llm.api_key = llm
                .api_key
                .map(|key| expand_env_vars(&key))
                .filter(|key| !key.trim().is_empty());
            config.llm.base_url = llm.base_url.filter(|u| !u.trim().is_empty());
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }

        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.file = logging.file.as_deref().map(expand_path);
        }

        Ok(config)
    }

    /// Applies `MEMORIA_*` environment variable overrides.
    ///
    /// Provider credentials (`OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `OPENAI_MODEL`, `ANTHROPIC_API_KEY`) are read by the clients
    /// themselves when the file leaves them unset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for unparseable values.
    pub fn with_env_overrides(self) -> crate::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MEMORIA_DATA_DIR") {
            self.data_dir = expand_path(&v);
        }
        if let Some(v) = get("MEMORIA_DB_PATH") {
            self.db_path = Some(expand_path(&v));
        }
        if let Some(v) = get("MEMORIA_TAGGING_USE_LLM") {
            self.tagging.use_llm = parse_bool("MEMORIA_TAGGING_USE_LLM", &v)?;
        }
        if let Some(v) = get("MEMORIA_TAGGING_LLM_CLUSTERING") {
            self.tagging.llm_clustering = parse_bool("MEMORIA_TAGGING_LLM_CLUSTERING", &v)?;
        }
        if let Some(v) = get("MEMORIA_LLM_PROVIDER") {
            self.llm.provider = LlmProviderKind::parse(&v)?;
        }
        if let Some(v) = get("MEMORIA_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets an explicit database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(Self::DB_FILE_NAME))
    }
}

/// Returns the platform data directory for memoria.
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".memoria"),
        |dirs| dirs.data_dir().join("memoria"),
    )
}

/// Expands `${VAR}` references and a leading `~/`.
fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw);
    if let Some(rest) = expanded.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(expanded)
}

/// Replaces `${VAR}` references with environment values (empty if unset).
#[must_use]
pub fn expand_env_vars(raw: &str) -> String {
    expand_with(raw, |name| std::env::var(name).ok())
}

fn expand_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_REFERENCE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn parse_bool(key: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::InvalidInput(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}
