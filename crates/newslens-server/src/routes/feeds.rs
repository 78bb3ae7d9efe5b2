//! Feed source health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use newslens_core::storage::feeds;

use super::success;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/feeds/healthz` — per-feed health map (`name -> healthy`).
pub async fn healthz(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let health = feeds::feed_health_map(&state.db).await?;
    Ok(success(json!(health)))
}
