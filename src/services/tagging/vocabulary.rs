//! Word lists used by tokenization and tag normalization.
//!
//! The lists are data, not algorithm: [`Vocabulary::default`] carries the
//! built-in English lists and configuration can extend them.

use std::collections::{HashMap, HashSet};

/// Common English function and filler words dropped during tokenization.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "yours", "with", "this", "that",
    "these", "those", "from", "have", "has", "had", "was", "were", "will", "would", "should",
    "could", "can", "may", "might", "must", "been", "being", "into", "onto", "over", "under",
    "about", "after", "before", "then", "than", "them", "they", "their", "there", "here", "what",
    "when", "where", "which", "while", "who", "whom", "why", "how", "all", "any", "some", "more",
    "most", "other", "such", "only", "own", "same", "too", "very", "just", "also", "our", "ours",
    "his", "her", "hers", "its", "she", "him", "make", "know", "help", "want", "need", "like",
    "love", "using", "use", "get", "got", "let", "please", "thanks", "does", "did", "each",
];

/// Tokens that carry no discriminative meaning inside a tag label.
pub const DEFAULT_FILLER_WORDS: &[&str] = &[
    "tip",
    "tips",
    "guide",
    "guides",
    "overview",
    "overviews",
    "basic",
    "basics",
    "strategy",
    "strategies",
    "concept",
    "concepts",
    "insight",
    "insights",
    "idea",
    "ideas",
    "general",
    "fundamental",
    "fundamentals",
];

/// Spelling and abbreviation variants rewritten to one form.
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("cv", "resume"),
    ("cvs", "resume"),
    ("curriculum", "resume"),
    ("vitae", "resume"),
    ("resumes", "resume"),
    ("internships", "internship"),
    ("interviewing", "interview"),
    ("interviews", "interview"),
];

/// Short tokens that still count as a meaningful overlap anchor.
pub const DEFAULT_SPECIAL_SHORT_TOKENS: &[&str] = &["cv"];

/// Word lists consulted by the tokenizer and the tag normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    stop_words: HashSet<String>,
    filler_words: HashSet<String>,
    synonyms: HashMap<String, String>,
    special_short_tokens: HashSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            stop_words: to_set(DEFAULT_STOP_WORDS.iter().copied()),
            filler_words: to_set(DEFAULT_FILLER_WORDS.iter().copied()),
            synonyms: DEFAULT_SYNONYMS
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
                .collect(),
            special_short_tokens: to_set(DEFAULT_SPECIAL_SHORT_TOKENS.iter().copied()),
        }
    }
}

impl Vocabulary {
    /// Builds the default vocabulary extended by configured lists.
    #[must_use]
    pub fn from_config(config: &crate::config::TaggingConfig) -> Self {
        Self::default()
            .with_stop_words(&config.extra_stop_words)
            .with_filler_words(&config.extra_filler_words)
            .with_special_short_tokens(&config.special_short_tokens)
            .with_synonyms(&config.synonyms)
    }

    /// Adds stop words.
    #[must_use]
    pub fn with_stop_words<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.stop_words.extend(to_set(words.iter().map(AsRef::as_ref)));
        self
    }

    /// Adds filler words.
    #[must_use]
    pub fn with_filler_words<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.filler_words
            .extend(to_set(words.iter().map(AsRef::as_ref)));
        self
    }

    /// Adds special short tokens.
    #[must_use]
    pub fn with_special_short_tokens<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.special_short_tokens
            .extend(to_set(words.iter().map(AsRef::as_ref)));
        self
    }

    /// Adds or overrides synonym mappings.
    #[must_use]
    pub fn with_synonyms(mut self, synonyms: &HashMap<String, String>) -> Self {
        for (from, to) in synonyms {
            let from = from.trim().to_lowercase();
            let to = to.trim().to_lowercase();
            if !from.is_empty() && !to.is_empty() {
                self.synonyms.insert(from, to);
            }
        }
        self
    }

    /// Returns true if `token` is a stop word.
    #[must_use]
    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Returns true if `token` is a filler word.
    #[must_use]
    pub fn is_filler(&self, token: &str) -> bool {
        self.filler_words.contains(token)
    }

    /// Returns the synonym target for `token`, if any.
    #[must_use]
    pub fn synonym(&self, token: &str) -> Option<&str> {
        self.synonyms.get(token).map(String::as_str)
    }

    /// Returns true if `token` is exempt from the minimum anchor length.
    #[must_use]
    pub fn is_special_short(&self, token: &str) -> bool {
        self.special_short_tokens.contains(token)
    }
}

fn to_set<'a>(words: impl Iterator<Item = &'a str>) -> HashSet<String> {
    words
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
