//! Token stemming, synonym mapping, and tag label normalization.
//!
//! Collapses superficial morphological and spelling variation so that
//! "Interviews", "Interviewing" and "Interview" compare equal, without a
//! general-purpose stemming library.

use super::Vocabulary;
use std::collections::BTreeSet;

/// Suffix rules as `(suffix, minimum exclusive length, replacement)`, first match wins.
const SUFFIX_RULES: &[(&str, usize, &str)] = &[
    ("ies", 4, "y"),
    ("ing", 5, ""),
    ("ed", 4, ""),
    ("es", 4, ""),
    ("s", 3, ""),
];

/// Reduces a lowercase token to its canonical root.
///
/// A synonym table hit wins outright; otherwise at most one suffix rule is
/// applied.
#[must_use]
pub fn stem_token(token: &str, vocabulary: &Vocabulary) -> String {
    if let Some(mapped) = vocabulary.synonym(token) {
        return mapped.to_string();
    }

    for (suffix, min_len, replacement) in SUFFIX_RULES {
        if token.len() > *min_len {
            if let Some(stem) = token.strip_suffix(suffix) {
                return format!("{stem}{replacement}");
            }
        }
    }

    token.to_string()
}

/// Returns the comparison key for a tag: lowercase alphanumeric words
/// separated by single spaces.
///
/// "Machine-Learning!" and "machine learning" share the key
/// `"machine learning"`.
#[must_use]
pub fn normalize_key(tag: &str) -> String {
    tag.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the stemmed, synonym-mapped, filler-free token set of a tag label.
///
/// Stop words are kept: "help" in "Help Desk" is part of the label's
/// meaning. Short tokens are kept too; the merge predicate decides whether
/// they count.
#[must_use]
pub fn meaningful_tokens(label: &str, vocabulary: &Vocabulary) -> BTreeSet<String> {
    normalize_key(label)
        .split_whitespace()
        .filter(|token| !vocabulary.is_filler(token))
        .map(|token| stem_token(token, vocabulary))
        .filter(|stem| !vocabulary.is_filler(stem))
        .collect()
}

/// Formats a token or phrase as a display label.
///
/// Labels of three characters or fewer are upper-cased ("ai" becomes "AI");
/// longer labels get the first letter of every whitespace-separated segment
/// capitalized. Blank input yields an empty string.
#[must_use]
pub fn format_label(token: &str) -> String {
    let cleaned = token.trim();
    if cleaned.is_empty() {
        return String::new();
    }
    if cleaned.chars().count() <= 3 {
        return cleaned.to_uppercase();
    }

    cleaned
        .split_whitespace()
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(segment: &str) -> String {
    let mut chars = segment.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
