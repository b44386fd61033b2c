//! LLM-assisted tag extraction with keyword fallback.
//!
//! The model is optional: when no provider is configured, the excerpt is
//! empty, the call fails, or the reply yields no usable tag, the keyword
//! extractor's result is returned instead. Failures never reach the caller.

use super::{KeywordTagExtractor, TagExtractor, format_label, normalize_key};
use crate::llm::{CompletionRequest, LlmProvider, parse_json_response};
use crate::models::{Conversation, TagCandidate, TagGenerationResult};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Default excerpt length, in characters.
pub const DEFAULT_MAX_EXCERPT_CHARS: usize = 4000;

/// Most tags kept from a model reply.
const MAX_LLM_TAGS: usize = 6;

/// Confidence used when the model omits one.
const DEFAULT_CONFIDENCE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "You are an AI librarian who summarizes conversations and emits concise topical tags. Tags must be 1-3 words each.";

/// Tag extractor backed by an LLM provider.
pub struct LlmTagExtractor {
    provider: Option<Arc<dyn LlmProvider>>,
    fallback: KeywordTagExtractor,
    max_excerpt_chars: usize,
}

impl LlmTagExtractor {
    /// Creates an extractor; `provider` may be absent.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, fallback: KeywordTagExtractor) -> Self {
        Self {
            provider,
            fallback,
            max_excerpt_chars: DEFAULT_MAX_EXCERPT_CHARS,
        }
    }

    /// Sets the excerpt length limit in characters.
    #[must_use]
    pub const fn with_max_excerpt_chars(mut self, max_excerpt_chars: usize) -> Self {
        self.max_excerpt_chars = max_excerpt_chars;
        self
    }

    fn fall_back(
        &self,
        conversation: &Conversation,
        documents: &[String],
        reason: &'static str,
    ) -> TagGenerationResult {
        metrics::counter!("tagging_fallback_total", "reason" => reason).increment(1);
        self.fallback
            .extract(conversation.id.clone(), &conversation.title, documents)
    }

    fn request_tags(
        &self,
        provider: &dyn LlmProvider,
        conversation: &Conversation,
        document_count: usize,
        excerpt: &str,
    ) -> Result<TagGenerationResult> {
        let request = build_tag_request(conversation, document_count, excerpt);
        let response = provider.complete_structured(&request)?;
        let payload: TagPayload = parse_json_response("parse_conversation_tags", &response)?;

        let raw_tags = payload.candidates();
        let normalized_tags = dedupe_labels(&raw_tags);
        if normalized_tags.is_empty() {
            return Err(Error::OperationFailed {
                operation: "generate_tags".to_string(),
                cause: "model returned no usable tags".to_string(),
            });
        }

        Ok(TagGenerationResult {
            conversation_id: conversation.id.clone(),
            raw_tags,
            normalized_tags,
            summary: payload.summary(),
        })
    }
}

impl TagExtractor for LlmTagExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn generate_tags(
        &self,
        conversation: &Conversation,
        documents: &[String],
    ) -> TagGenerationResult {
        metrics::counter!("tagging_requests_total", "extractor" => "llm").increment(1);

        let Some(provider) = self.provider.as_deref().filter(|p| p.is_configured()) else {
            return self.fall_back(conversation, documents, "unconfigured");
        };

        let excerpt = build_excerpt(&conversation.title, documents, self.max_excerpt_chars);
        if excerpt.is_empty() {
            return self.fall_back(conversation, documents, "empty_excerpt");
        }

        match self.request_tags(provider, conversation, documents.len(), &excerpt) {
            Ok(result) => {
                tracing::debug!(
                    conversation_id = %conversation.id,
                    provider = provider.name(),
                    tags = result.normalized_tags.len(),
                    "Generated tags with LLM"
                );
                result
            },
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    provider = provider.name(),
                    error = %e,
                    "LLM tagging failed, falling back to keywords"
                );
                self.fall_back(conversation, documents, "llm_error")
            },
        }
    }
}

/// Builds the prompt excerpt: title and non-empty documents joined by blank
/// lines, trimmed, then cut to `max_chars` characters.
#[must_use]
pub fn build_excerpt(title: &str, documents: &[String], max_chars: usize) -> String {
    let joined = std::iter::once(title)
        .chain(documents.iter().map(String::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    joined.trim().chars().take(max_chars).collect()
}

fn build_tag_request(
    conversation: &Conversation,
    document_count: usize,
    excerpt: &str,
) -> CompletionRequest {
    let user = format!(
        "Conversation title: {title}\nSource: {source}\nMessage count in excerpt: {document_count}\nConversation excerpt:\n\"\"\"\n{excerpt}\n\"\"\"\nOutput JSON with a summary string and an array of tags. Each tag needs name, short rationale, confidence 0-1.",
        title = conversation.title,
        source = conversation.source,
    );

    CompletionRequest::new(SYSTEM_PROMPT, user)
        .with_schema("conversation_tags", tag_schema())
        .with_max_tokens(600)
        .with_temperature(0.2)
}

fn tag_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "tags": {
                "type": "array",
                "minItems": 2,
                "maxItems": 6,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "rationale": { "type": "string" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["name"]
                }
            }
        },
        "required": ["tags"]
    })
}

/// Keeps the first label per normalized key, capped.
fn dedupe_labels(candidates: &[TagCandidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|candidate| {
            let key = normalize_key(&candidate.name);
            (!key.is_empty() && seen.insert(key)).then(|| candidate.name.clone())
        })
        .take(MAX_LLM_TAGS)
        .collect()
}

/// Model reply.
#[derive(Debug, Deserialize)]
struct TagPayload {
    #[serde(default)]
    summary: Option<serde_json::Value>,
    #[serde(default)]
    tags: Vec<TagPayloadItem>,
}

#[derive(Debug, Deserialize)]
struct TagPayloadItem {
    #[serde(default, alias = "label")]
    name: Option<String>,
    #[serde(default, alias = "reason")]
    rationale: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

impl TagPayload {
    fn summary(&self) -> Option<String> {
        self.summary
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn candidates(&self) -> Vec<TagCandidate> {
        self.tags
            .iter()
            .filter_map(|item| {
                let name = item
                    .name
                    .as_deref()
                    .map(format_label)
                    .filter(|n| !n.is_empty())?;
                let confidence = item
                    .confidence
                    .as_ref()
                    .and_then(serde_json::Value::as_f64)
                    .map_or(DEFAULT_CONFIDENCE, |c| c.clamp(0.0, 1.0) as f32);
                Some(TagCandidate {
                    name,
                    confidence,
                    rationale: item
                        .rationale
                        .as_deref()
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string),
                })
            })
            .collect()
    }
}
