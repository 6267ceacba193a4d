//! HTTP front end for the search service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Embed `{"query": "..."}` and return the best corpus match |
//! | `GET`  | `/health` | Server version, index readiness, cumulative token usage |
//! | `POST` | `/index/rebuild` | Retry the corpus build after a failure |
//!
//! The corpus build starts in the background when the server starts; until
//! it completes, `/search` answers `503 index_not_ready`.
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "empty_query", "message": "query must not be empty" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `empty_query`, `empty_batch`, `empty_corpus` | 400 |
//! | `build_in_progress`, `already_built` | 409 |
//! | `dimension_mismatch`, `internal` | 500 |
//! | `provider_error` | 502 |
//! | `index_not_ready` | 503 |

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use semsearch_core::{
    CorpusIndex, EmbeddingClient, EmbeddingProvider, Readiness, SearchError, SearchResult,
    SearchService, UsageTracker,
};

use crate::config::Config;
use crate::embedding::create_provider;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    service: SearchService,
    /// Corpus texts, kept for rebuilds.
    corpus: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(service: SearchService, corpus: Vec<String>) -> Self {
        Self {
            service,
            corpus: Arc::new(corpus),
        }
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }
}

/// Wire up the service from configuration: provider, usage tracker, client, index.
pub fn build_service(config: &Config, provider: Arc<dyn EmbeddingProvider>) -> SearchService {
    let usage = Arc::new(UsageTracker::new());
    let client =
        EmbeddingClient::new(provider, usage).with_batch_size(config.embedding.batch_size);
    SearchService::new(client, Arc::new(CorpusIndex::new()))
}

/// Starts the HTTP server with the provider named in the configuration.
///
/// Binds to `[server].bind`, starts the corpus build in the background, and
/// serves until the process receives Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider = create_provider(&config.embedding)?;
    run_server_with_provider(config, provider).await
}

/// Starts the HTTP server with an explicit embedding provider.
pub async fn run_server_with_provider(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<()> {
    let corpus = config.corpus.load()?;
    let state = AppState::new(build_service(config, provider), corpus);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("semsearch listening on http://{}", listener.local_addr()?);

    // Not awaited: requests are served (and rejected) while the build runs.
    drop(spawn_build(&state));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .route("/index/rebuild", post(handle_rebuild))
        .layer(cors)
        .with_state(state)
}

/// Start a corpus build on a background task.
///
/// The returned channel resolves once the build has been claimed (or
/// refused), not when it finishes.
fn spawn_build(state: &AppState) -> oneshot::Receiver<Result<(), SearchError>> {
    let (started_tx, started_rx) = oneshot::channel();
    let service = state.service.clone();
    let corpus = state.corpus.clone();

    tokio::spawn(async move {
        let ticket = match service.index().begin_build() {
            Ok(ticket) => {
                let _ = started_tx.send(Ok(()));
                ticket
            }
            Err(e) => {
                let _ = started_tx.send(Err(e));
                return;
            }
        };

        info!(entries = corpus.len(), "building corpus index");
        if let Err(e) = ticket.run(service.client(), &corpus).await {
            error!(error = %e, "corpus index unavailable; POST /index/rebuild to retry");
        }
    });

    started_rx
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"index_not_ready"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let status = match &err {
            SearchError::EmptyQuery | SearchError::EmptyBatch | SearchError::EmptyCorpus => {
                StatusCode::BAD_REQUEST
            }
            SearchError::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::EmbeddingProvider { .. } => StatusCode::BAD_GATEWAY,
            SearchError::BuildInProgress | SearchError::AlreadyBuilt => StatusCode::CONFLICT,
            SearchError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    match state.service.search(&req.query).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            match &e {
                SearchError::DimensionMismatch { .. } => error!(error = %e, "search failed"),
                SearchError::EmbeddingProvider { .. } => warn!(error = %e, "search failed"),
                _ => {}
            }
            Err(e.into())
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    /// `"ok"` once the index is ready, `"unavailable"` otherwise.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    index: Readiness,
    /// Tokens consumed since startup (corpus build plus queries).
    total_tokens: u64,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let index = state.service.readiness();
    Json(HealthResponse {
        status: (if index.is_ready() { "ok" } else { "unavailable" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index,
        total_tokens: state.service.usage().current_total(),
    })
}

// ============ POST /index/rebuild ============

async fn handle_rebuild(State(state): State<AppState>) -> Result<Response, AppError> {
    spawn_build(&state)
        .await
        .map_err(|_| internal("index build task exited before starting"))??;

    info!("corpus index rebuild requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "building" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (SearchError::IndexNotReady, StatusCode::SERVICE_UNAVAILABLE),
            (SearchError::EmptyQuery, StatusCode::BAD_REQUEST),
            (SearchError::provider(0, "boom"), StatusCode::BAD_GATEWAY),
            (
                SearchError::DimensionMismatch {
                    expected: 3,
                    actual: 2,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (SearchError::AlreadyBuilt, StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            let kind = err.kind();
            let app: AppError = err.into();
            assert_eq!(app.status, status);
            assert_eq!(app.code, kind);
        }
    }
}
