//! Embedding provider implementations.
//!
//! Implements the core [`EmbeddingProvider`] trait for concrete backends:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]** — calls an OpenAI-compatible `POST /embeddings` endpoint.
//!
//! Batching, usage accounting, and dimension validation happen in
//! [`semsearch_core::EmbeddingClient`]; providers only perform one call per
//! batch. Provider calls are never retried: a failed call fails the request.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use semsearch::config::EmbeddingConfig;
//! # use semsearch::embedding::create_provider;
//! # use semsearch_core::EmbeddingProvider;
//! let config = EmbeddingConfig {
//!     provider: "disabled".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use semsearch_core::embedding::{EmbeddingProvider, ProviderBatch};

use crate::config::EmbeddingConfig;

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<ProviderBatch> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/embeddings` with the configured model. The API key is
/// read from the environment variable named by `embedding.api_key_env`
/// (default `OPENAI_API_KEY`).
pub struct OpenAIProvider {
    /// Model name (e.g. `"text-embedding-ada-002"`).
    model: String,
    /// Vector dimensionality (e.g. `1536`).
    dims: usize,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key environment variable is not set or
    /// the HTTP client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit API key.
    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            endpoint: format!("{}/embeddings", config.url.trim_end_matches('/')),
            api_key: api_key.into(),
            client,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Usage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<ProviderBatch> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint.as_str())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("OpenAI request to {} failed", self.endpoint))?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        parse_openai_response(&body_text)
    }
}

/// Parse the OpenAI embeddings API response body.
///
/// Items are re-ordered by their `index` field so vectors line up with the
/// request's input order.
fn parse_openai_response(body: &str) -> Result<ProviderBatch> {
    let mut response: EmbeddingResponse =
        serde_json::from_str(body).context("Invalid OpenAI response")?;

    response.data.sort_by_key(|d| d.index);
    for (expected, item) in response.data.iter().enumerate() {
        if item.index != expected {
            bail!(
                "Invalid OpenAI response: expected embedding index {}, got {}",
                expected,
                item.index
            );
        }
    }

    Ok(ProviderBatch {
        vectors: response.data.into_iter().map(|d| d.embedding).collect(),
        total_tokens: response.usage.total_tokens,
    })
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
///
/// # Errors
///
/// Returns an error for unknown provider names or if the OpenAI provider
/// cannot be initialized (missing API key).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
