//! Tokenizer and stop-word filter.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use super::Vocabulary;
use regex::Regex;
use std::sync::LazyLock;

/// Minimum token length kept by the tokenizer.
pub const MIN_TOKEN_LEN: usize = 3;

/// Matches every run of characters outside `[a-z0-9\s]`.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]+").expect("static regex: non-word characters"));

/// Splits `text` into candidate keyword tokens.
///
/// Lowercases, blanks out punctuation, splits on whitespace, and drops tokens
/// that are shorter than [`MIN_TOKEN_LEN`], purely numeric, or stop words.
/// Order and duplicates are preserved for frequency counting.
#[must_use]
pub fn tokenize(text: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !vocabulary.is_stop_word(token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        tokenize(text, &Vocabulary::default())
    }

    #[test]
    fn test_tokenize_filters_stop_words_and_short_tokens() {
        let result = tokens("I love using Python for data science");
        assert_eq!(result, vec!["python", "data", "science"]);
    }

    #[test]
    fn test_tokenize_cat_sentence() {
        let result = tokens("the cat sat on a mat about AI");
        assert_eq!(result, vec!["cat", "sat", "mat"]);
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        let result = tokens("Rust's borrow-checker (and lifetimes)!");
        assert_eq!(result, vec!["rust", "borrow", "checker", "lifetimes"]);
    }

    #[test]
    fn test_tokenize_drops_numbers_keeps_alphanumerics() {
        let result = tokens("2024 roadmap for web3 and 1000 users");
        assert_eq!(result, vec!["roadmap", "web3", "users"]);
    }

    #[test]
    fn test_tokenize_preserves_duplicates() {
        let result = tokens("python python\npython");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokens("").is_empty());
        assert!(tokens("   \n\t ").is_empty());
    }
}
