//! Embedding provider trait, batching client, and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, and the [`EmbeddingClient`] that sits in front of a provider:
//!
//! - splits large inputs into batches of at most `batch_size` texts,
//! - validates every provider response (count, dimensionality, finiteness),
//! - records each batch's token usage in the shared [`UsageTracker`].
//!
//! Concrete network providers (OpenAI) live in the `semsearch` app crate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SearchError;
use crate::usage::UsageTracker;

/// Maximum number of texts sent in a single provider call by default.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One provider response: a vector per input text plus the tokens billed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBatch {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

/// Trait for embedding providers.
///
/// A provider turns one batch of texts into one vector per text, in input
/// order, and reports how many tokens the call consumed. Providers do not
/// batch, retry, or account usage themselves; [`EmbeddingClient`] does that.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<ProviderBatch>;
}

/// Vectors for a whole `embed` call plus the tokens it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub vectors: Vec<Vec<f32>>,
    pub tokens_used: u64,
}

/// Batching, validating front end to an [`EmbeddingProvider`].
///
/// Cheap to clone; the provider and usage tracker are shared.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    usage: Arc<UsageTracker>,
    batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, usage: Arc<UsageTracker>) -> Self {
        Self {
            provider,
            usage,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// Embed `texts`, returning one vector per text in input order.
    ///
    /// Texts are sent in consecutive batches of at most `batch_size`. Each
    /// batch's token count is recorded in the usage tracker once its
    /// response passes validation. If any batch fails, the whole call fails with the
    /// failing batch's starting offset and no vectors are returned.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyBatch`] if `texts` is empty.
    /// - [`SearchError::EmbeddingProvider`] if a provider call fails, returns
    ///   the wrong number of vectors, or returns non-finite values.
    /// - [`SearchError::DimensionMismatch`] if a vector's length differs from
    ///   the provider's declared dimensionality.
    pub async fn embed(&self, texts: &[String]) -> Result<Embeddings, SearchError> {
        if texts.is_empty() {
            return Err(SearchError::EmptyBatch);
        }

        let dims = self.provider.dims();
        let mut vectors = Vec::with_capacity(texts.len());
        let mut tokens_used = 0u64;

        for (batch_no, chunk) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;
            debug!(batch = batch_no + 1, offset, size = chunk.len(), "embedding batch");

            let batch = self
                .provider
                .embed_batch(chunk)
                .await
                .map_err(|e| SearchError::provider(offset, format!("{:#}", e)))?;

            // A rejected response counts as a provider error: nothing recorded.
            validate_batch(&batch, chunk.len(), dims, offset)?;

            let total = self.usage.record_usage(batch.total_tokens);
            info!(
                batch = batch_no + 1,
                offset,
                tokens = batch.total_tokens,
                total_tokens = total,
                "token usage for batch"
            );

            tokens_used += batch.total_tokens;
            vectors.extend(batch.vectors);
        }

        info!(
            texts = texts.len(),
            tokens = tokens_used,
            total_tokens = self.usage.current_total(),
            model = self.provider.model_name(),
            "embedding complete"
        );

        Ok(Embeddings {
            vectors,
            tokens_used,
        })
    }

    /// Embed a single text; returns its vector and the tokens it consumed.
    pub async fn embed_one(&self, text: &str) -> Result<(Vec<f32>, u64), SearchError> {
        let Embeddings {
            vectors,
            tokens_used,
        } = self.embed(&[text.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::provider(0, "empty embedding response"))?;
        Ok((vector, tokens_used))
    }
}

fn validate_batch(
    batch: &ProviderBatch,
    expected: usize,
    dims: usize,
    offset: usize,
) -> Result<(), SearchError> {
    if batch.vectors.len() != expected {
        return Err(SearchError::provider(
            offset,
            format!(
                "provider returned {} embeddings for {} inputs",
                batch.vectors.len(),
                expected
            ),
        ));
    }

    for (i, vector) in batch.vectors.iter().enumerate() {
        if vector.len() != dims {
            return Err(SearchError::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::provider(
                offset,
                format!("embedding {} contains non-finite values", offset + i),
            ));
        }
    }

    Ok(())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or when
/// either vector has zero norm, so the result is never NaN.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // Accumulate in f64 so small-magnitude vectors keep a non-zero norm.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}
