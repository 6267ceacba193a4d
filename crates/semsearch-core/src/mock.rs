//! Deterministic in-memory [`EmbeddingProvider`] for tests.
//!
//! Not selectable from configuration; unit and integration tests inject it
//! directly in place of a network provider.
//!
//! [`KeywordProvider`] embeds a text as a bag-of-words count vector over a
//! fixed vocabulary: dimension `i` holds the number of occurrences of the
//! `i`-th vocabulary word. Texts sharing more words therefore score higher
//! under cosine similarity. Words outside the vocabulary are ignored for the
//! vector but still count as tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::bail;
use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, ProviderBatch};

/// Split `text` into lowercase alphanumeric words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Token count billed by [`KeywordProvider`] for one text.
pub fn count_tokens(text: &str) -> u64 {
    tokenize(text).count() as u64
}

/// Bag-of-words embedding provider with failure injection.
pub struct KeywordProvider {
    vocabulary: HashMap<String, usize>,
    reported_dims: usize,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl KeywordProvider {
    /// Build a provider over an explicit vocabulary. Duplicates are ignored.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = HashMap::new();
        for word in vocabulary {
            for token in tokenize(word.as_ref()) {
                let next = index.len();
                index.entry(token).or_insert(next);
            }
        }
        let reported_dims = index.len();
        Self {
            vocabulary: index,
            reported_dims,
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Build a provider whose vocabulary is every word appearing in `texts`.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(texts.iter().map(|t| t.as_ref()))
    }

    /// Make the `call`-th provider call (0-based) fail.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Declare a dimensionality different from the vectors actually produced.
    pub fn with_reported_dims(mut self, dims: usize) -> Self {
        self.reported_dims = dims;
        self
    }

    /// Number of `embed_batch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of every batch received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The vector this provider produces for `text`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for token in tokenize(text) {
            if let Some(&i) = self.vocabulary.get(&token) {
                vector[i] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dims(&self) -> usize {
        self.reported_dims
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<ProviderBatch> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(texts.len());

        if self.fail_on_call == Some(call) {
            bail!("injected provider failure on call {}", call);
        }

        Ok(ProviderBatch {
            vectors: texts.iter().map(|t| self.embed_text(t)).collect(),
            total_tokens: texts.iter().map(|t| count_tokens(t)).sum(),
        })
    }
}
