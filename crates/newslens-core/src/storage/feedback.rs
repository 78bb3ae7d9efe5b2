//! Append-only user feedback records.

use super::DbPool;
use crate::error::StorageError;

/// Accepted feedback categories. The empty string means "uncategorised".
pub const CATEGORIES: &[&str] = &["agree", "disagree", "unclear", "other", ""];

/// A stored feedback record.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Feedback {
    /// Surrogate row ID.
    pub id: i64,
    /// Article the feedback refers to.
    pub article_id: i64,
    /// Submitting user identifier.
    pub user_id: String,
    /// Free-text feedback.
    pub feedback_text: String,
    /// One of [`CATEGORIES`].
    pub category: String,
    /// Ensemble row the feedback refers to, when known.
    pub ensemble_output_id: Option<i64>,
    /// Submission channel.
    pub source: String,
    /// RFC-3339 creation timestamp.
    pub created_at: String,
}

/// Fields required to record feedback.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    /// Article the feedback refers to.
    pub article_id: i64,
    /// Submitting user identifier (non-empty).
    pub user_id: String,
    /// Free-text feedback (non-empty).
    pub feedback_text: String,
    /// One of [`CATEGORIES`].
    pub category: String,
    /// Ensemble row the feedback refers to, when known.
    pub ensemble_output_id: Option<i64>,
    /// Submission channel.
    pub source: String,
}

/// Insert a feedback record, returning its ID.
pub async fn insert_feedback(pool: &DbPool, feedback: &NewFeedback) -> Result<i64, StorageError> {
    let created_at = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO feedback \
         (article_id, user_id, feedback_text, category, ensemble_output_id, source, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(feedback.article_id)
    .bind(&feedback.user_id)
    .bind(&feedback.feedback_text)
    .bind(&feedback.category)
    .bind(feedback.ensemble_output_id)
    .bind(&feedback.source)
    .bind(&created_at)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::articles::{insert_article, NewArticle};
    use crate::storage::init_test_db;

    #[tokio::test]
    async fn insert_feedback_returns_id() {
        let pool = init_test_db().await.expect("init test db");
        let article_id = insert_article(
            &pool,
            &NewArticle {
                source: "reuters".to_string(),
                url: "http://e/a".to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                pub_date: "2024-01-01T00:00:00Z".to_string(),
            },
        )
        .await
        .expect("insert article");

        let id = insert_feedback(
            &pool,
            &NewFeedback {
                article_id,
                user_id: "user-1".to_string(),
                feedback_text: "score feels too far left".to_string(),
                category: "disagree".to_string(),
                ensemble_output_id: None,
                source: "api".to_string(),
            },
        )
        .await
        .expect("insert feedback");

        assert!(id > 0);
    }

    #[test]
    fn categories_include_the_empty_string() {
        assert!(CATEGORIES.contains(&""));
        assert!(CATEGORIES.contains(&"agree"));
    }
}
