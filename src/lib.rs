//! # semsearch
//!
//! A minimal semantic-search service. At startup it embeds a small static
//! corpus with a remote embedding model; each query is embedded the same
//! way and answered with the corpus entry of highest cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ HTTP/CLI │──▶│ SearchService │──▶│ EmbeddingClient │──▶ OpenAI
//! └──────────┘   └──────┬────────┘   └────────┬────────┘
//!                       ▼                     ▼
//!                 ┌─────────────┐      ┌──────────────┐
//!                 │ CorpusIndex │      │ UsageTracker │
//!                 └─────────────┘      └──────────────┘
//! ```
//!
//! The pipeline itself lives in the `semsearch-core` crate; this crate adds
//! configuration, the OpenAI provider, the HTTP server, and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding provider implementations |
//! | [`search_cmd`] | One-shot CLI search |
//! | [`server`] | HTTP server |

pub mod config;
pub mod embedding;
pub mod search_cmd;
pub mod server;
