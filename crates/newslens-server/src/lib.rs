//! newslens HTTP API server.
//!
//! Exposes `newslens-core`'s scoring pipeline and storage layer as a REST
//! API: article CRUD and listings, reanalysis triggers with live SSE
//! progress, bias/ensemble reads, feedback, and health endpoints.

pub mod error;
pub mod routes;
pub mod sse;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        // Articles
        .route(
            "/articles",
            get(routes::articles::list_articles).post(routes::articles::create_article),
        )
        .route("/articles/{id}", get(routes::articles::get_article))
        .route("/articles/{id}/bias", get(routes::articles::bias))
        .route("/articles/{id}/ensemble", get(routes::articles::ensemble))
        .route("/manual-score/{id}", post(routes::articles::manual_score))
        // LLM
        .route("/llm/reanalyze/{id}", post(routes::llm::reanalyze))
        .route("/llm/score-progress/{id}", get(sse::score_progress))
        .route("/llm/health", get(routes::llm::health))
        // Feedback
        .route("/feedback", post(routes::feedback::submit))
        // Feeds
        .route("/feeds/healthz", get(routes::feeds::healthz));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
