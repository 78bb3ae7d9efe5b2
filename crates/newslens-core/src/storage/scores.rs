//! Operations for per-model and ensemble LLM scores.
//!
//! Per-model rows are unique per `(article_id, model)` and replaced on
//! reanalysis; `ensemble` rows accumulate so older aggregates remain for
//! audit. Metadata is stored as an opaque JSON blob — unknown fields
//! round-trip untouched.

use super::DbPool;
use crate::error::StorageError;
use serde_json::Value;

/// The reserved model name for the aggregate row.
pub const MODEL_ENSEMBLE: &str = "ensemble";
/// The reserved model name for the separately produced text summary row.
pub const MODEL_SUMMARIZER: &str = "summarizer";

/// One stored LLM score row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct LlmScore {
    /// Surrogate row ID.
    pub id: i64,
    /// Owning article.
    pub article_id: i64,
    /// Model name, or one of the reserved values.
    pub model: String,
    /// Bias score in [-1, 1].
    pub score: f64,
    /// Opaque JSON metadata (per-model rows carry at least `confidence`
    /// and `explanation`; ensemble rows carry `sub_results` and
    /// `final_aggregation`).
    pub metadata: String,
    /// RFC-3339 creation timestamp.
    pub created_at: String,
}

impl LlmScore {
    /// Parse the metadata blob. Malformed metadata degrades to an empty
    /// object rather than failing reads.
    pub fn metadata_json(&self) -> Value {
        serde_json::from_str(&self.metadata).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// The model's self-reported confidence, 0 when missing or unparseable.
    pub fn confidence(&self) -> f64 {
        self.metadata_json()
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// The model's explanation text, empty when missing.
    pub fn explanation(&self) -> String {
        self.metadata_json()
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Insert a score row. Non-ensemble rows upsert on `(article_id, model)`;
/// ensemble rows always append.
pub async fn insert_llm_score(
    pool: &DbPool,
    article_id: i64,
    model: &str,
    score: f64,
    metadata: &Value,
) -> Result<i64, StorageError> {
    let created_at = chrono::Utc::now().to_rfc3339();
    let metadata_text = metadata.to_string();

    let sql = if model == MODEL_ENSEMBLE {
        "INSERT INTO llm_scores (article_id, model, score, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?)"
    } else {
        "INSERT INTO llm_scores (article_id, model, score, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(article_id, model) WHERE model != 'ensemble' \
         DO UPDATE SET score = excluded.score, metadata = excluded.metadata, \
         created_at = excluded.created_at"
    };

    let result = sqlx::query(sql)
        .bind(article_id)
        .bind(model)
        .bind(score)
        .bind(&metadata_text)
        .bind(&created_at)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.last_insert_rowid())
}

/// Fetch every score row for an article (per-model and ensemble), oldest
/// first.
pub async fn fetch_llm_scores(pool: &DbPool, article_id: i64) -> Result<Vec<LlmScore>, StorageError> {
    sqlx::query_as::<_, LlmScore>(
        "SELECT * FROM llm_scores WHERE article_id = ? ORDER BY id ASC",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Fetch the current ensemble row — the one with the largest `created_at`.
pub async fn fetch_latest_ensemble_score(
    pool: &DbPool,
    article_id: i64,
) -> Result<Option<LlmScore>, StorageError> {
    sqlx::query_as::<_, LlmScore>(
        "SELECT * FROM llm_scores WHERE article_id = ? AND model = 'ensemble' \
         ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(article_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Fetch the full ensemble history for an article, newest first.
pub async fn fetch_ensemble_scores(
    pool: &DbPool,
    article_id: i64,
) -> Result<Vec<LlmScore>, StorageError> {
    sqlx::query_as::<_, LlmScore>(
        "SELECT * FROM llm_scores WHERE article_id = ? AND model = 'ensemble' \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Delete every non-ensemble score row for an article. Run by the pipeline
/// before writing a fresh batch.
pub async fn delete_llm_scores_except_ensemble(
    pool: &DbPool,
    article_id: i64,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM llm_scores WHERE article_id = ? AND model != 'ensemble'")
        .bind(article_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}
