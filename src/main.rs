//! # semsearch CLI
//!
//! ## Usage
//!
//! ```bash
//! semsearch [--config ./config/semsearch.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `semsearch serve` | Start the HTTP server (corpus is embedded in the background) |
//! | `semsearch search "<query>"` | Embed the corpus, run one query, print the result |
//!
//! The API key is read from `OPENAI_API_KEY` (or the variable named by
//! `embedding.api_key_env`). Log verbosity follows `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use semsearch::{config, search_cmd, server};

/// semsearch — semantic search over a small static corpus.
#[derive(Parser)]
#[command(name = "semsearch", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `POST /search`, `GET /health`, and `POST /index/rebuild` on
    /// the address configured in `[server].bind`.
    Serve,

    /// Run a single query against the corpus and print the best match.
    Search {
        /// The search query string.
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "semsearch=info,semsearch_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let cfg = config::Config::default();
            config::validate(&cfg)?;
            cfg
        }
    };

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Search { query } => search_cmd::run_search(&cfg, &query).await?,
    }

    Ok(())
}
