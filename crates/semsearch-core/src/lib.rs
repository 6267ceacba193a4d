//! # semsearch core
//!
//! Transport-agnostic logic for semsearch: the embedding pipeline, the
//! in-memory corpus index, the search service, and token accounting.
//!
//! This crate contains no HTTP client, server, or runtime dependencies.
//! Concrete network providers live in the `semsearch` app crate and plug in
//! through the [`embedding::EmbeddingProvider`] trait.
//!
//! ```text
//!            ┌──────────────┐
//!  query ──▶ │SearchService │──────────────┐
//!            └──────┬───────┘              ▼
//!                   ▼               ┌─────────────┐
//!          ┌─────────────────┐      │ CorpusIndex │
//!          │ EmbeddingClient │◀─────│   (build)   │
//!          └──────┬──────────┘      └─────────────┘
//!                 ▼
//!    EmbeddingProvider + UsageTracker
//! ```

pub mod embedding;
pub mod error;
pub mod index;
/// Test support: a deterministic provider for unit and integration tests.
pub mod mock;
pub mod search;
pub mod usage;

pub use embedding::{cosine_similarity, EmbeddingClient, EmbeddingProvider, Embeddings};
pub use error::SearchError;
pub use index::{BestMatch, CorpusEntry, CorpusIndex, Readiness};
pub use search::{SearchResult, SearchService};
pub use usage::UsageTracker;
