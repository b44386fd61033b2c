//! LLM tag clustering.
//!
//! Asks the model to group tag variants under canonical names, a batch at
//! a time. Any failed batch fails the whole pass; the canonicalizer then
//! proceeds with its deterministic merge alone.

use super::{format_label, normalize_key};
use crate::llm::{CompletionRequest, LlmProvider, parse_json_response};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of labels sent per request.
pub const DEFAULT_CLUSTER_BATCH_SIZE: usize = 40;

const SYSTEM_PROMPT: &str = "You are an AI librarian who consolidates a tag vocabulary. Group tags that name the same topic, including abbreviations, plurals and synonyms, under one short canonical tag of 1-3 words. Every input tag must appear in exactly one cluster.";

/// Groups tag labels into clusters using an LLM.
pub struct LlmTagClusterer {
    provider: Arc<dyn LlmProvider>,
    batch_size: usize,
}

impl LlmTagClusterer {
    /// Creates a clusterer with the default batch size.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_CLUSTER_BATCH_SIZE,
        }
    }

    /// Sets the batch size; zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Clusters `labels`, returning normalized key to formatted canonical.
    ///
    /// Keys the model did not mention are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not configured or any batch
    /// request or reply parse fails.
    pub fn cluster(&self, labels: &[String]) -> Result<HashMap<String, String>> {
        if !self.provider.is_configured() {
            return Err(Error::OperationFailed {
                operation: "cluster_tags".to_string(),
                cause: format!("provider {} is not configured", self.provider.name()),
            });
        }

        let mut mapping = HashMap::new();
        for batch in labels.chunks(self.batch_size) {
            for cluster in self.request_batch(batch)? {
                let canonical = format_label(&cluster.canonical);
                if canonical.is_empty() {
                    continue;
                }
                for member in std::iter::once(&cluster.canonical).chain(cluster.aliases.iter()) {
                    let key = normalize_key(member);
                    if !key.is_empty() {
                        mapping.entry(key).or_insert_with(|| canonical.clone());
                    }
                }
            }
        }

        tracing::debug!(
            labels = labels.len(),
            mapped = mapping.len(),
            provider = self.provider.name(),
            "Clustered tags with LLM"
        );
        Ok(mapping)
    }

    fn request_batch(&self, batch: &[String]) -> Result<Vec<TagCluster>> {
        let listing = batch
            .iter()
            .map(|label| format!("- {label}"))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Tags:\n{listing}\n\nOutput JSON with an array of clusters. Each cluster needs a canonical name and the aliases it absorbs."
        );

        let request = CompletionRequest::new(SYSTEM_PROMPT, user)
            .with_schema("tag_clusters", cluster_schema())
            .with_max_tokens(1200)
            .with_temperature(0.1);

        let response = self.provider.complete_structured(&request)?;
        let payload: ClusterPayload = parse_json_response("parse_tag_clusters", &response)?;
        Ok(payload.clusters)
    }
}

fn cluster_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "clusters": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "canonical": { "type": "string" },
                        "aliases": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["canonical", "aliases"]
                }
            }
        },
        "required": ["clusters"]
    })
}

#[derive(Debug, Deserialize)]
struct ClusterPayload {
    #[serde(default)]
    clusters: Vec<TagCluster>,
}

#[derive(Debug, Deserialize)]
struct TagCluster {
    canonical: String,
    #[serde(default)]
    aliases: Vec<String>,
}
