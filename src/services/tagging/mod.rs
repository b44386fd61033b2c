//! Tag generation and canonicalization.
//!
//! Two extractors produce per-conversation tags: [`KeywordTagExtractor`]
//! (local TF-IDF) and [`LlmTagExtractor`] (model-assisted, falling back to
//! keywords). [`TagCanonicalizer`] then reconciles tags across the corpus.

mod canonical;
mod clustering;
mod extractor;
mod keyword;
mod llm;
mod normalize;
mod tokenizer;
mod vocabulary;

pub use canonical::{CanonicalMap, TagCanonicalizer, UnionFind, dedupe_key};
pub use clustering::{DEFAULT_CLUSTER_BATCH_SIZE, LlmTagClusterer};
pub use extractor::{TagExtractor, build_tag_extractor};
pub use keyword::KeywordTagExtractor;
pub use llm::{DEFAULT_MAX_EXCERPT_CHARS, LlmTagExtractor, build_excerpt};
pub use normalize::{format_label, meaningful_tokens, normalize_key, stem_token};
pub use tokenizer::{MIN_TOKEN_LEN, tokenize};
pub use vocabulary::{
    DEFAULT_FILLER_WORDS, DEFAULT_SPECIAL_SHORT_TOKENS, DEFAULT_STOP_WORDS, DEFAULT_SYNONYMS,
    Vocabulary,
};
