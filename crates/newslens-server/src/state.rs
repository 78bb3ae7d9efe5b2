//! Shared application state for the newslens server.

use std::sync::Arc;

use newslens_core::analysis::Reanalyzer;
use newslens_core::cache::ResponseCache;
use newslens_core::llm::ArticleScorer;
use newslens_core::progress::ProgressTracker;
use newslens_core::storage::DbPool;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// LLM scoring client.
    pub scorer: Arc<dyn ArticleScorer>,
    /// Per-article reanalysis progress, read by the SSE streamer.
    pub progress: Arc<ProgressTracker>,
    /// TTL cache in front of the read endpoints.
    pub cache: Arc<ResponseCache>,
    /// Reanalysis orchestrator.
    pub reanalyzer: Arc<Reanalyzer>,
}
