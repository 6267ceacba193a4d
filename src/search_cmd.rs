//! One-shot search from the command line.
//!
//! Builds the corpus index in the foreground, runs a single query, and
//! prints the result as JSON. Useful for checking provider configuration
//! without starting the server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use semsearch_core::{EmbeddingProvider, SearchResult};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::server::build_service;

/// Run `query` against the configured corpus and print the result.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let provider = create_provider(&config.embedding)?;
    let (result, total_tokens) = search_with_provider(config, provider, query).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    info!(total_tokens, "total token usage");
    Ok(())
}

/// Build the index, run one search, and return the result with the
/// cumulative token usage (corpus build plus query).
pub async fn search_with_provider(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
    query: &str,
) -> Result<(SearchResult, u64)> {
    let corpus = config.corpus.load()?;
    let service = build_service(config, provider);

    service
        .build_index(&corpus)
        .await
        .context("Failed to build corpus index")?;
    let result = service.search(query).await?;

    Ok((result, service.usage().current_total()))
}
