//! LLM endpoints: reanalysis trigger and provider health.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use newslens_core::storage::articles;

use super::{parse_article_id, success};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/llm/reanalyze/{id}` — trigger a reanalysis.
///
/// A body carrying a numeric `score` takes the direct-override path (no
/// pipeline, no progress events); anything else enqueues a full background
/// reanalysis and returns immediately.
pub async fn reanalyze(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_article_id(&id)?;

    if let Some(score_field) = body.as_ref().and_then(|Json(b)| b.get("score")) {
        let score = score_field
            .as_f64()
            .ok_or_else(|| ApiError::BadRequest("score must be a number".to_string()))?;
        if !(-1.0..=1.0).contains(&score) {
            return Err(ApiError::BadRequest(format!(
                "score {score} outside valid range [-1, 1]"
            )));
        }

        state.reanalyzer.apply_manual_score(id, score).await?;
        return Ok(success(json!({
            "id": id,
            "status": "score updated",
            "score": score,
        })));
    }

    // Confirm existence before queueing so callers get a 404 up front.
    articles::fetch_article_by_id(&state.db, id).await?;

    state.reanalyzer.queue_reanalysis(id);

    Ok(success(json!({ "id": id, "status": "reanalysis queued" })))
}

/// `GET /api/llm/health` — validate the provider API key.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.scorer.validate_key().await?;
    Ok(success(json!({ "status": "ok" })))
}
