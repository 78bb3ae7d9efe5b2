//! API error types for the newslens server.
//!
//! Maps core domain errors to HTTP status codes and the JSON error
//! envelope: `{"success": false, "error": {code, message, details?,
//! recommended_action?}}`. LLM errors are shaped by the shared translator
//! in `newslens-core` so the HTTP boundary and the progress stream stay
//! symmetrical.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use newslens_core::error::{LlmError, StorageError};
use newslens_core::llm::translate;
use serde_json::json;

/// API error type for route handlers.
pub enum ApiError {
    /// Internal storage/database error.
    Storage(StorageError),
    /// Typed LLM failure, shaped by the shared translator.
    Llm(LlmError),
    /// Requested resource not found.
    NotFound(String),
    /// Bad request (invalid parameters, malformed body, etc.).
    BadRequest(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        Self::Llm(err)
    }
}

fn envelope(
    code: &str,
    message: &str,
    details: Option<serde_json::Value>,
    recommended_action: Option<&str>,
) -> serde_json::Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    if let Some(action) = recommended_action {
        error["recommended_action"] = json!(action);
    }
    json!({ "success": false, "error": error })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Storage(StorageError::ArticleNotFound { id }) => (
                StatusCode::NOT_FOUND,
                axum::Json(envelope("not_found", &format!("article {id} not found"), None, None)),
            )
                .into_response(),
            Self::Storage(StorageError::DuplicateUrl { url }) => (
                StatusCode::CONFLICT,
                axum::Json(envelope(
                    "duplicate_url",
                    &format!("article with URL '{url}' already exists"),
                    None,
                    None,
                )),
            )
                .into_response(),
            Self::Storage(StorageError::InvalidScore { score }) => (
                StatusCode::BAD_REQUEST,
                axum::Json(envelope(
                    "validation_error",
                    &format!("score {score} outside valid range [-1, 1]"),
                    None,
                    None,
                )),
            )
                .into_response(),
            Self::Storage(e) => {
                tracing::error!("storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(envelope("internal", "internal storage error", None, None)),
                )
                    .into_response()
            }
            Self::Llm(e) => {
                let disposition = translate(&e);
                let status = StatusCode::from_u16(disposition.http_status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let details = disposition
                    .retry_after_seconds
                    .map(|secs| json!({ "retry_after_seconds": secs }));
                let body = axum::Json(envelope(
                    disposition.code,
                    &disposition.message,
                    details,
                    disposition.recommended_action,
                ));

                match disposition.retry_after_seconds {
                    Some(secs) => {
                        (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response()
                    }
                    None => (status, body).into_response(),
                }
            }
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                axum::Json(envelope("not_found", &msg, None, None)),
            )
                .into_response(),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                axum::Json(envelope("validation_error", &msg, None, None)),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_includes_optional_fields_only_when_present() {
        let bare = envelope("not_found", "gone", None, None);
        assert_eq!(bare["success"], json!(false));
        assert!(bare["error"].get("details").is_none());
        assert!(bare["error"].get("recommended_action").is_none());

        let full = envelope(
            "llm_rate_limited",
            "slow down",
            Some(json!({"retry_after_seconds": 30})),
            Some("Retry after the indicated delay"),
        );
        assert_eq!(full["error"]["details"]["retry_after_seconds"], json!(30));
        assert_eq!(
            full["error"]["recommended_action"],
            json!("Retry after the indicated delay")
        );
    }
}
