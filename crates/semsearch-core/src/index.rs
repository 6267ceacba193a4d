//! In-memory corpus index with brute-force cosine scoring.
//!
//! The index moves through an explicit lifecycle:
//!
//! ```text
//!  NotReady ──build──▶ Building ──ok──▶ Ready
//!      ▲                   │
//!      │                   └──err / cancelled──▶ Failed ──build──▶ Building
//! ```
//!
//! Queries are only answered in `Ready`; every other state yields
//! [`SearchError::IndexNotReady`]. A ready corpus is an immutable snapshot
//! behind an `Arc`, so scans never hold the state lock.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{error, info};

use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::error::SearchError;

/// One corpus text and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Position in the original corpus.
    pub ordinal: usize,
}

/// Result of a nearest-match query.
#[derive(Debug, Clone)]
pub struct BestMatch {
    pub entry: Arc<CorpusEntry>,
    pub score: f32,
}

/// Externally visible lifecycle state of a [`CorpusIndex`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    NotReady,
    Building,
    Ready { entries: usize, dims: usize },
    Failed { reason: String },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

struct Corpus {
    entries: Vec<Arc<CorpusEntry>>,
    dims: usize,
}

impl Corpus {
    fn best_match(&self, query: &[f32]) -> Result<BestMatch, SearchError> {
        if query.len() != self.dims {
            return Err(SearchError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut best: Option<(&Arc<CorpusEntry>, f32)> = None;
        for entry in &self.entries {
            let score = cosine_similarity(query, &entry.embedding);
            // Strictly greater: the earliest entry wins ties.
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((entry, score)),
            }
        }

        best.map(|(entry, score)| BestMatch {
            entry: entry.clone(),
            score,
        })
        .ok_or(SearchError::EmptyCorpus)
    }
}

enum IndexState {
    NotReady,
    Building,
    Ready(Arc<Corpus>),
    Failed(String),
}

/// The static corpus and its precomputed embeddings.
pub struct CorpusIndex {
    state: RwLock<IndexState>,
}

impl Default for CorpusIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::NotReady),
        }
    }

    /// Embed `corpus` and make it queryable.
    ///
    /// Allowed from the not-ready and failed states. On failure the index
    /// moves to failed and the error is returned; a later call may retry.
    /// Returns the number of entries indexed.
    ///
    /// # Errors
    ///
    /// - [`SearchError::BuildInProgress`] / [`SearchError::AlreadyBuilt`] if
    ///   the index is not in a buildable state.
    /// - [`SearchError::EmptyCorpus`] if `corpus` is empty.
    /// - Any error from [`EmbeddingClient::embed`].
    pub async fn build(
        &self,
        client: &EmbeddingClient,
        corpus: &[String],
    ) -> Result<usize, SearchError> {
        self.begin_build()?.run(client, corpus).await
    }

    /// Claim the index for a build without starting it yet.
    ///
    /// The returned ticket moves the index to failed if it is dropped
    /// before [`BuildTicket::run`] completes.
    pub fn begin_build(&self) -> Result<BuildTicket<'_>, SearchError> {
        let mut state = self.write_state();
        match *state {
            IndexState::Building => return Err(SearchError::BuildInProgress),
            IndexState::Ready(_) => return Err(SearchError::AlreadyBuilt),
            IndexState::NotReady | IndexState::Failed(_) => {}
        }
        *state = IndexState::Building;
        Ok(BuildTicket {
            index: self,
            finished: false,
        })
    }

    /// Return the entry most similar to `query`, with its score.
    ///
    /// Ties resolve to the lowest ordinal.
    pub fn find_best_match(&self, query: &[f32]) -> Result<BestMatch, SearchError> {
        self.snapshot()?.best_match(query)
    }

    pub fn readiness(&self) -> Readiness {
        match &*self.read_state() {
            IndexState::NotReady => Readiness::NotReady,
            IndexState::Building => Readiness::Building,
            IndexState::Ready(corpus) => Readiness::Ready {
                entries: corpus.entries.len(),
                dims: corpus.dims,
            },
            IndexState::Failed(reason) => Readiness::Failed {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.read_state(), IndexState::Ready(_))
    }

    /// Number of indexed entries (0 unless ready).
    pub fn len(&self) -> usize {
        match &*self.read_state() {
            IndexState::Ready(corpus) => corpus.entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Result<Arc<Corpus>, SearchError> {
        match &*self.read_state() {
            IndexState::Ready(corpus) => Ok(corpus.clone()),
            _ => Err(SearchError::IndexNotReady),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to build a [`CorpusIndex`], obtained from
/// [`CorpusIndex::begin_build`].
pub struct BuildTicket<'a> {
    index: &'a CorpusIndex,
    finished: bool,
}

impl BuildTicket<'_> {
    /// Embed `corpus` and publish the result.
    pub async fn run(
        mut self,
        client: &EmbeddingClient,
        corpus: &[String],
    ) -> Result<usize, SearchError> {
        let result = Self::embed_corpus(client, corpus).await;
        let mut state = self.index.write_state();
        self.finished = true;

        match result {
            Ok(built) => {
                let count = built.entries.len();
                info!(
                    entries = count,
                    dims = built.dims,
                    total_tokens = client.usage().current_total(),
                    "corpus index ready"
                );
                *state = IndexState::Ready(Arc::new(built));
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "corpus index build failed");
                *state = IndexState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn embed_corpus(client: &EmbeddingClient, corpus: &[String]) -> Result<Corpus, SearchError> {
        if corpus.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let embedded = client.embed(corpus).await?;
        let dims = client.provider().dims();

        let entries = corpus
            .iter()
            .zip(embedded.vectors)
            .enumerate()
            .map(|(ordinal, (text, embedding))| {
                Arc::new(CorpusEntry {
                    text: text.clone(),
                    embedding,
                    ordinal,
                })
            })
            .collect();

        Ok(Corpus { entries, dims })
    }
}

impl Drop for BuildTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.index.write_state() = IndexState::Failed("build cancelled".to_string());
        }
    }
}
