//! Route modules for the newslens API server.

pub mod articles;
pub mod feedback;
pub mod feeds;
pub mod health;
pub mod llm;

use serde_json::{json, Value};

/// Wrap response data in the success envelope.
pub(crate) fn success(data: Value) -> axum::Json<Value> {
    axum::Json(json!({ "success": true, "data": data }))
}

/// Parse a path segment as a positive article ID.
pub(crate) fn parse_article_id(raw: &str) -> Result<i64, crate::error::ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| crate::error::ApiError::BadRequest(format!("invalid article id '{raw}'")))
}
