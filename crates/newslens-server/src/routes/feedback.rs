//! User feedback endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use newslens_core::storage::articles;
use newslens_core::storage::feedback::{self, NewFeedback, CATEGORIES};

use super::success;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for submitting feedback.
#[derive(Deserialize)]
pub struct FeedbackRequest {
    /// Article the feedback refers to.
    pub article_id: i64,
    /// Submitting user identifier.
    pub user_id: String,
    /// Free-text feedback.
    pub feedback_text: String,
    /// Optional category: agree, disagree, unclear, or other.
    #[serde(default)]
    pub category: String,
    /// Optional ensemble row the feedback refers to.
    pub ensemble_output_id: Option<i64>,
    /// Optional submission channel (defaults to "api").
    pub source: Option<String>,
}

/// `POST /api/feedback` — record feedback and invalidate the article's
/// score caches.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.article_id <= 0 {
        return Err(ApiError::BadRequest("article_id is required".to_string()));
    }
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if body.feedback_text.trim().is_empty() {
        return Err(ApiError::BadRequest("feedback_text is required".to_string()));
    }
    if !CATEGORIES.contains(&body.category.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "category must be one of agree, disagree, unclear, other (got '{}')",
            body.category
        )));
    }

    // The feedback table references articles; surface a validation error
    // rather than a constraint failure.
    match articles::fetch_article_by_id(&state.db, body.article_id).await {
        Ok(_) => {}
        Err(newslens_core::error::StorageError::ArticleNotFound { id }) => {
            return Err(ApiError::BadRequest(format!("article {id} does not exist")));
        }
        Err(e) => return Err(e.into()),
    }

    let id = feedback::insert_feedback(
        &state.db,
        &NewFeedback {
            article_id: body.article_id,
            user_id: body.user_id.trim().to_string(),
            feedback_text: body.feedback_text,
            category: body.category,
            ensemble_output_id: body.ensemble_output_id,
            source: body.source.unwrap_or_else(|| "api".to_string()),
        },
    )
    .await?;

    state.cache.invalidate_article(body.article_id);

    Ok(success(json!({ "feedback_id": id })))
}
