//! CRUD operations for ingested articles.
//!
//! Articles are created by the ingest path and mutated only by the
//! reanalysis pipeline or the manual-score path; the core never hard-deletes
//! them.

use super::DbPool;
use crate::error::StorageError;

/// Article status: created but never scored.
pub const STATUS_PENDING: &str = "pending";
/// Article status: carries a composite score.
pub const STATUS_ANALYZED: &str = "analyzed";

/// Score source: set by the LLM ensemble pipeline.
pub const SCORE_SOURCE_LLM: &str = "llm";
/// Score source: set by a caller-supplied override.
pub const SCORE_SOURCE_MANUAL: &str = "manual";

/// A news article row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Article {
    /// Database ID (positive).
    pub id: i64,
    /// Feed or publisher name.
    pub source: String,
    /// Canonical article URL (unique).
    pub url: String,
    /// Headline.
    pub title: String,
    /// Full body text.
    pub content: String,
    /// RFC-3339 publication timestamp.
    pub pub_date: String,
    /// RFC-3339 ingestion timestamp.
    pub created_at: String,
    /// Lifecycle status: `pending`, `analyzed`, or `error`.
    pub status: String,
    /// Composite bias score in [-1, 1], absent until scored.
    pub composite_score: Option<f64>,
    /// Confidence in [0, 1], absent until scored.
    pub confidence: Option<f64>,
    /// `llm` or `manual`; present whenever `composite_score` is.
    pub score_source: Option<String>,
}

/// Fields required to create an article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Feed or publisher name (non-empty).
    pub source: String,
    /// Canonical URL, `http://` or `https://`.
    pub url: String,
    /// Headline.
    pub title: String,
    /// Full body text.
    pub content: String,
    /// RFC-3339 publication timestamp.
    pub pub_date: String,
}

/// Insert a new article, returning its ID. A URL collision maps to
/// [`StorageError::DuplicateUrl`].
pub async fn insert_article(pool: &DbPool, article: &NewArticle) -> Result<i64, StorageError> {
    let created_at = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO articles (source, url, title, content, pub_date, created_at, status) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending')",
    )
    .bind(&article.source)
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.pub_date)
    .bind(&created_at)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(StorageError::DuplicateUrl {
                url: article.url.clone(),
            })
        }
        Err(e) => Err(StorageError::Query { source: e }),
    }
}

/// Fetch a single article by ID.
pub async fn fetch_article_by_id(pool: &DbPool, id: i64) -> Result<Article, StorageError> {
    sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?
        .ok_or(StorageError::ArticleNotFound { id })
}

/// Check whether an article with the given URL exists.
pub async fn article_exists_by_url(pool: &DbPool, url: &str) -> Result<bool, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM articles WHERE url = ?)")
        .bind(url)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(row.0 == 1)
}

/// SQL predicate for a leaning filter over the composite score. Unscored
/// articles count as 0 (center).
fn leaning_predicate(leaning: &str) -> Option<&'static str> {
    match leaning {
        "left" => Some(" AND COALESCE(composite_score, 0) < -0.1"),
        "right" => Some(" AND COALESCE(composite_score, 0) > 0.1"),
        "center" => {
            Some(" AND COALESCE(composite_score, 0) >= -0.1 AND COALESCE(composite_score, 0) <= 0.1")
        }
        _ => None,
    }
}

/// Fetch articles ordered by composite score descending (unscored sort as
/// 0), optionally filtered by source and leaning.
pub async fn fetch_articles(
    pool: &DbPool,
    source: Option<&str>,
    leaning: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Article>, StorageError> {
    let mut sql = String::from("SELECT * FROM articles WHERE 1=1");
    if source.is_some() {
        sql.push_str(" AND source = ?");
    }
    if let Some(predicate) = leaning.and_then(leaning_predicate) {
        sql.push_str(predicate);
    }
    sql.push_str(" ORDER BY COALESCE(composite_score, 0) DESC, id ASC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, Article>(&sql);
    if let Some(s) = source {
        query = query.bind(s.to_string());
    }
    query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// Count articles matching the same filters as [`fetch_articles`].
pub async fn count_articles(
    pool: &DbPool,
    source: Option<&str>,
    leaning: Option<&str>,
) -> Result<i64, StorageError> {
    let mut sql = String::from("SELECT COUNT(*) FROM articles WHERE 1=1");
    if source.is_some() {
        sql.push_str(" AND source = ?");
    }
    if let Some(predicate) = leaning.and_then(leaning_predicate) {
        sql.push_str(predicate);
    }

    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    if let Some(s) = source {
        query = query.bind(s.to_string());
    }
    let (count,) = query
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(count)
}

/// Authoritative write of the composite score.
///
/// Rejects `|score| > 1` before touching the pool, so a validation failure
/// is always distinguishable from a transport error. Marks the article
/// `analyzed` and records who set the score (`llm` or `manual`).
pub async fn update_article_score(
    pool: &DbPool,
    id: i64,
    score: f64,
    confidence: f64,
    score_source: &str,
) -> Result<(), StorageError> {
    if !(-1.0..=1.0).contains(&score) || !score.is_finite() {
        return Err(StorageError::InvalidScore { score });
    }

    let result = sqlx::query(
        "UPDATE articles SET composite_score = ?, confidence = ?, score_source = ?, \
         status = 'analyzed' WHERE id = ?",
    )
    .bind(score)
    .bind(confidence)
    .bind(score_source)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    if result.rows_affected() == 0 {
        return Err(StorageError::ArticleNotFound { id });
    }

    Ok(())
}
