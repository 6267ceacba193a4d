//! Query-time orchestration: embed the query, score it against the corpus.
//!
//! [`SearchService`] is the single entry point every front end (CLI, HTTP)
//! delegates to. It owns an [`EmbeddingClient`] and shares the
//! [`CorpusIndex`] with whoever runs the startup build.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embedding::EmbeddingClient;
use crate::error::SearchError;
use crate::index::{CorpusIndex, Readiness};
use crate::usage::UsageTracker;

/// Response payload for one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Text of the most similar corpus entry.
    pub best_match_text: String,
    /// Cosine similarity between the query and the matched entry.
    pub similarity_score: f32,
    /// Tokens consumed embedding the query.
    pub query_token_count: u64,
    /// Ordinal of the matched entry in the corpus.
    pub match_index: usize,
}

/// Embeds queries and finds their nearest corpus entry.
#[derive(Clone)]
pub struct SearchService {
    client: EmbeddingClient,
    index: Arc<CorpusIndex>,
}

impl SearchService {
    pub fn new(client: EmbeddingClient, index: Arc<CorpusIndex>) -> Self {
        Self { client, index }
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    pub fn client(&self) -> &EmbeddingClient {
        &self.client
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        self.client.usage()
    }

    pub fn readiness(&self) -> Readiness {
        self.index.readiness()
    }

    /// Build the index from `corpus` using this service's client.
    pub async fn build_index(&self, corpus: &[String]) -> Result<usize, SearchError> {
        self.index.build(&self.client, corpus).await
    }

    /// Find the corpus entry most similar to `query`.
    ///
    /// Readiness is checked before the query is embedded, so requests that
    /// cannot succeed never spend tokens.
    ///
    /// # Errors
    ///
    /// - [`SearchError::IndexNotReady`] if the index is not built.
    /// - [`SearchError::EmptyQuery`] if `query` is empty or whitespace.
    /// - [`SearchError::EmbeddingProvider`] or
    ///   [`SearchError::DimensionMismatch`] from the embedding step.
    pub async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        if !self.index.is_ready() {
            return Err(SearchError::IndexNotReady);
        }
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let (vector, tokens) = self.client.embed_one(query).await?;
        let best = self.index.find_best_match(&vector)?;

        debug!(
            match_index = best.entry.ordinal,
            score = best.score,
            tokens,
            "search complete"
        );

        Ok(SearchResult {
            best_match_text: best.entry.text.clone(),
            similarity_score: best.score,
            query_token_count: tokens,
            match_index: best.entry.ordinal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, ProviderBatch};
    use crate::mock::{count_tokens, KeywordProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    fn sample_corpus() -> Vec<String> {
        vec![
            "Information about product A.".to_string(),
            "Details regarding service B.".to_string(),
            "FAQs about product C.".to_string(),
        ]
    }

    fn service_with(provider: KeywordProvider) -> SearchService {
        let client = EmbeddingClient::new(Arc::new(provider), Arc::new(UsageTracker::new()));
        SearchService::new(client, Arc::new(CorpusIndex::new()))
    }

    fn sample_service() -> SearchService {
        let mut vocabulary = sample_corpus();
        vocabulary.push("Tell me about service B".to_string());
        service_with(KeywordProvider::from_texts(&vocabulary))
    }

    #[tokio::test]
    async fn test_service_b_query_matches_service_b() {
        let service = sample_service();
        service.build_index(&sample_corpus()).await.unwrap();

        let result = service.search("Tell me about service B").await.unwrap();
        assert_eq!(result.best_match_text, "Details regarding service B.");
        assert_eq!(result.match_index, 1);
        assert_eq!(result.query_token_count, 5);

        let (query, _) = service.client().embed_one("Tell me about service B").await.unwrap();
        for other in [0, 2] {
            let entry_vec = service
                .client()
                .embed_one(&sample_corpus()[other])
                .await
                .unwrap()
                .0;
            let other_score = crate::embedding::cosine_similarity(&query, &entry_vec);
            assert!(result.similarity_score > other_score);
        }
    }

    #[tokio::test]
    async fn test_search_before_build_is_not_ready() {
        let service = sample_service();
        let err = service.search("Tell me about service B").await.unwrap_err();
        assert_eq!(err, SearchError::IndexNotReady);
        // Nothing was embedded.
        assert_eq!(service.usage().current_total(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let service = sample_service();
        service.build_index(&sample_corpus()).await.unwrap();
        let before = service.usage().current_total();

        for q in ["", "   ", "\n\t"] {
            assert_eq!(service.search(q).await.unwrap_err(), SearchError::EmptyQuery);
        }
        assert_eq!(service.usage().current_total(), before);
    }

    #[tokio::test]
    async fn test_provider_failure_scoped_to_request() {
        // Call 0 builds the corpus, call 1 (first query) fails.
        let service = service_with(KeywordProvider::from_texts(&sample_corpus()).failing_on_call(1));
        service.build_index(&sample_corpus()).await.unwrap();

        let err = service.search("product").await.unwrap_err();
        assert!(matches!(err, SearchError::EmbeddingProvider { offset: 0, .. }));

        // The index is untouched and the next request succeeds.
        assert!(service.readiness().is_ready());
        let result = service.search("product A").await.unwrap();
        assert_eq!(result.match_index, 0);
    }

    /// Holds every call until the gate is open.
    struct GatedProvider {
        inner: KeywordProvider,
        gate: watch::Receiver<bool>,
        started: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for GatedProvider {
        fn model_name(&self) -> &str {
            "gated"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<ProviderBatch> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.gate.clone();
            gate.wait_for(|open| *open).await?;
            self.inner.embed_batch(texts).await
        }
    }

    #[tokio::test]
    async fn test_abandoned_query_leaves_index_and_usage_intact() {
        let query = "Tell me about service B";
        let mut vocabulary = sample_corpus();
        vocabulary.push(query.to_string());

        let (open, gate) = watch::channel(true);
        let provider = Arc::new(GatedProvider {
            inner: KeywordProvider::from_texts(&vocabulary),
            gate,
            started: AtomicUsize::new(0),
        });
        let client = EmbeddingClient::new(provider.clone(), Arc::new(UsageTracker::new()));
        let service = SearchService::new(client, Arc::new(CorpusIndex::new()));

        service.build_index(&sample_corpus()).await.unwrap();
        let build_tokens = service.usage().current_total();
        assert_eq!(provider.started.load(Ordering::SeqCst), 1);

        open.send(false).unwrap();
        let pending = {
            let service = service.clone();
            tokio::spawn(async move { service.search(query).await })
        };
        for _ in 0..1000 {
            if provider.started.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.started.load(Ordering::SeqCst), 2);

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        assert!(service.readiness().is_ready());
        assert_eq!(service.index().len(), 3);
        assert_eq!(service.usage().current_total(), build_tokens);

        open.send(true).unwrap();
        let result = service.search(query).await.unwrap();
        assert_eq!(result.match_index, 1);
        assert_eq!(
            service.usage().current_total(),
            build_tokens + count_tokens(query)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_account_every_token() {
        let service = sample_service();
        service.build_index(&sample_corpus()).await.unwrap();
        let build_tokens: u64 = sample_corpus().iter().map(|t| count_tokens(t)).sum();
        assert_eq!(service.usage().current_total(), build_tokens);

        let queries: Vec<String> = (0..64)
            .map(|i| match i % 3 {
                0 => "Tell me about service B".to_string(),
                1 => "product A information please".to_string(),
                _ => format!("FAQs about product C number {}", i),
            })
            .collect();
        let expected: u64 = queries.iter().map(|q| count_tokens(q)).sum();

        let handles: Vec<_> = queries
            .into_iter()
            .map(|q| {
                let service = service.clone();
                tokio::spawn(async move { service.search(&q).await })
            })
            .collect();

        let mut reported = 0;
        for h in handles {
            reported += h.await.unwrap().unwrap().query_token_count;
        }

        assert_eq!(reported, expected);
        assert_eq!(service.usage().current_total(), build_tokens + expected);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = SearchResult {
            best_match_text: "x".to_string(),
            similarity_score: 0.5,
            query_token_count: 3,
            match_index: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["bestMatchText"], "x");
        assert_eq!(json["similarityScore"], 0.5);
        assert_eq!(json["queryTokenCount"], 3);
        assert_eq!(json["matchIndex"], 0);
    }
}
