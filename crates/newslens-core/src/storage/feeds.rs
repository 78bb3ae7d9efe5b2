//! Feed source health bookkeeping.
//!
//! The RSS collector itself lives outside the core; it records fetch
//! outcomes here, and the health endpoint reads the resulting map. A feed
//! is healthy while its consecutive-error streak is zero.

use super::DbPool;
use crate::error::StorageError;
use std::collections::HashMap;

/// A registered feed source.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct FeedSource {
    /// Surrogate row ID.
    pub id: i64,
    /// Feed display name (unique).
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// RFC-3339 timestamp of the last fetch attempt.
    pub last_fetched_at: Option<String>,
    /// Consecutive failed fetches; 0 means healthy.
    pub error_streak: i64,
}

/// Register a feed source, or update its URL if the name already exists.
pub async fn upsert_feed_source(pool: &DbPool, name: &str, url: &str) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO feed_sources (name, url) VALUES (?, ?) \
         ON CONFLICT(name) DO UPDATE SET url = excluded.url",
    )
    .bind(name)
    .bind(url)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Record the outcome of a fetch attempt: success resets the error streak,
/// failure increments it.
pub async fn record_fetch_outcome(
    pool: &DbPool,
    name: &str,
    success: bool,
) -> Result<(), StorageError> {
    let now = chrono::Utc::now().to_rfc3339();
    let sql = if success {
        "UPDATE feed_sources SET last_fetched_at = ?, error_streak = 0 WHERE name = ?"
    } else {
        "UPDATE feed_sources SET last_fetched_at = ?, error_streak = error_streak + 1 WHERE name = ?"
    };

    sqlx::query(sql)
        .bind(&now)
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Health map for every registered feed: `name -> healthy`.
pub async fn feed_health_map(pool: &DbPool) -> Result<HashMap<String, bool>, StorageError> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, error_streak FROM feed_sources")
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows
        .into_iter()
        .map(|(name, streak)| (name, streak == 0))
        .collect())
}
