//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

use super::success;

/// `GET /api/health` — process liveness.
pub async fn health() -> Json<Value> {
    success(json!({ "status": "ok", "version": newslens_core::version() }))
}
