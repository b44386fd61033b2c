//! LLM client and service factory functions for CLI commands.
//!
//! Provides builders for creating LLM clients and tagging services from
//! configuration.

use std::sync::Arc;

use crate::config::{LlmConfig, LlmProviderKind, MemoriaConfig};
use crate::llm::{AnthropicClient, LlmHttpConfig, LlmProvider, OpenAiClient};
use crate::services::RetagService;
use crate::services::tagging::{
    LlmTagClusterer, TagCanonicalizer, TagExtractor, Vocabulary, build_tag_extractor,
};
use crate::storage::ConversationStore;

/// Builds HTTP configuration from LLM config with environment overrides.
#[must_use]
pub fn build_http_config(llm_config: &LlmConfig) -> LlmHttpConfig {
    LlmHttpConfig::from_config(llm_config).with_env_overrides()
}

/// Builds an `OpenAI` client from configuration.
///
/// Values set in `llm_config` win over `OPENAI_*` environment variables.
#[must_use]
pub fn build_openai_client(llm_config: &LlmConfig) -> OpenAiClient {
    OpenAiClient::with_settings(
        OpenAiClient::env_settings()
            .apply_config(llm_config)
            .with_http(build_http_config(llm_config)),
    )
}

/// Builds an Anthropic client from configuration.
///
/// Values set in `llm_config` win over `ANTHROPIC_*` environment variables.
#[must_use]
pub fn build_anthropic_client(llm_config: &LlmConfig) -> AnthropicClient {
    AnthropicClient::with_settings(
        AnthropicClient::env_settings()
            .apply_config(llm_config)
            .with_http(build_http_config(llm_config)),
    )
}

/// Builds the configured LLM provider.
///
/// Returns `None` when the provider is set to `none`. A provider without
/// credentials is still returned; callers check `is_configured`.
#[must_use]
pub fn build_llm_provider(llm_config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match llm_config.provider {
        LlmProviderKind::OpenAi => Arc::new(build_openai_client(llm_config)),
        LlmProviderKind::Anthropic => Arc::new(build_anthropic_client(llm_config)),
        LlmProviderKind::None => return None,
    };
    tracing::debug!(
        provider = provider.name(),
        configured = provider.is_configured(),
        "Built LLM provider"
    );
    Some(provider)
}

/// Tagging components wired from configuration.
pub struct TaggingServices {
    /// Vocabulary shared by every component.
    pub vocabulary: Arc<Vocabulary>,
    /// The configured extractor.
    pub extractor: Arc<dyn TagExtractor>,
    /// The canonicalizer, with LLM clustering when enabled.
    pub canonicalizer: TagCanonicalizer,
}

/// Builds the extractor and canonicalizer from configuration.
///
/// `keyword_only` forces the keyword extractor and disables clustering.
#[must_use]
pub fn build_tagging_services(config: &MemoriaConfig, keyword_only: bool) -> TaggingServices {
    let vocabulary = Arc::new(Vocabulary::from_config(&config.tagging));
    let wants_llm = !keyword_only && (config.tagging.use_llm || config.tagging.llm_clustering);
    let provider = if wants_llm {
        build_llm_provider(&config.llm)
    } else {
        None
    };

    let mut tagging = config.tagging.clone();
    tagging.use_llm = tagging.use_llm && !keyword_only;
    let extractor = build_tag_extractor(&tagging, Arc::clone(&vocabulary), provider.clone());

    let mut canonicalizer = TagCanonicalizer::new(Arc::clone(&vocabulary));
    if tagging.llm_clustering && !keyword_only {
        if let Some(provider) = provider {
            canonicalizer = canonicalizer.with_clusterer(
                LlmTagClusterer::new(provider).with_batch_size(tagging.cluster_batch_size),
            );
        }
    }

    TaggingServices {
        vocabulary,
        extractor,
        canonicalizer,
    }
}

/// Builds a re-tag service over `store`.
#[must_use]
pub fn build_retag_service(
    config: &MemoriaConfig,
    store: Arc<dyn ConversationStore>,
    keyword_only: bool,
) -> RetagService {
    let services = build_tagging_services(config, keyword_only);
    RetagService::new(store, services.extractor, services.canonicalizer)
}
