//! HTTP transport shared by the chat-completion clients.
//!
//! Providers differ in request and reply shapes only. Credentials, the
//! base URL, timeouts and the failure mapping live here.

use super::LlmHttpConfig;
use crate::config::LlmConfig;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Longest slice of an error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Where and how to reach one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// API key; requests fail before any network traffic without one.
    pub api_key: Option<String>,
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Request and connect timeouts.
    pub http: LlmHttpConfig,
}

impl ApiSettings {
    /// Creates settings without an API key.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: trim_base_url(base_url.into()),
            model: model.into(),
            http: LlmHttpConfig::from_env(),
        }
    }

    /// Takes the API key from `var` when it is set and not blank.
    #[must_use]
    pub fn with_key_from_env(mut self, var: &str) -> Self {
        if let Some(key) = non_empty_env(var) {
            self.api_key = Some(key);
        }
        self
    }

    /// Overlays every value set in `config`.
    #[must_use]
    pub fn apply_config(mut self, config: &LlmConfig) -> Self {
        if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(api_key.to_string());
        }
        if let Some(model) = &config.model {
            self.model.clone_from(model);
        }
        if let Some(base_url) = &config.base_url {
            self.base_url = trim_base_url(base_url.clone());
        }
        self
    }

    /// Replaces the timeouts.
    #[must_use]
    pub const fn with_http(mut self, http: LlmHttpConfig) -> Self {
        self.http = http;
        self
    }
}

/// A configured HTTP endpoint for one named provider.
pub(super) struct Transport {
    provider: &'static str,
    settings: ApiSettings,
    client: reqwest::blocking::Client,
}

impl Transport {
    pub(super) fn new(provider: &'static str, settings: ApiSettings) -> Self {
        let client = build_http_client(settings.http);
        Self {
            provider,
            settings,
            client,
        }
    }

    pub(super) fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub(super) fn model(&self) -> &str {
        &self.settings.model
    }

    /// Returns the API key, or an error naming the variable to set.
    pub(super) fn api_key(&self, env_var: &str) -> Result<&str> {
        self.settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| self.failure("request", format!("{env_var} not set")))
    }

    /// POSTs `body` as JSON to `path` under the base URL and decodes the reply.
    pub(super) fn post<B, R>(&self, path: &str, headers: &[(&str, String)], body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.settings.base_url);
        tracing::debug!(provider = self.provider, model = %self.settings.model, %url, "Sending completion request");

        let started = Instant::now();
        let mut request = self.client.post(&url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let result = request
            .send()
            .map_err(|e| {
                let kind = failure_kind(&e);
                tracing::warn!(provider = self.provider, model = %self.settings.model, error = %e, kind, "Completion request failed");
                self.failure("request", format!("{kind} error: {e}"))
            })
            .and_then(|response| self.decode(response));

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("llm_requests_total", "provider" => self.provider, "status" => status)
            .increment(1);
        metrics::histogram!("llm_request_duration_ms", "provider" => self.provider)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn decode<R: DeserializeOwned>(&self, response: reqwest::blocking::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            tracing::warn!(provider = self.provider, status = status.as_u16(), "Completion service returned an error status");
            return Err(self.failure("request", format!("HTTP {status}: {detail}")));
        }
        response
            .json()
            .map_err(|e| self.failure("response", e.to_string()))
    }

    pub(super) fn failure(&self, stage: &str, cause: String) -> Error {
        Error::OperationFailed {
            operation: format!("{}_{stage}", self.provider),
            cause,
        }
    }
}

fn failure_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_decode() {
        "decode"
    } else {
        "request"
    }
}

/// Builds a blocking HTTP client with the configured timeouts; zero disables one.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build LLM HTTP client, using defaults");
        reqwest::blocking::Client::new()
    })
}

pub(super) fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
