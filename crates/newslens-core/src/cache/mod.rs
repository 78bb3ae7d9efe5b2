//! TTL response cache for read endpoints.
//!
//! A keyed map of pre-serialized JSON responses with a per-entry deadline.
//! Expired entries are invisible to readers and swept opportunistically
//! while the write lock is held. Successful writes (score overrides,
//! completed reanalyses, accepted feedback) invalidate the affected keys.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-memory TTL cache for GET responses.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Look up a key. Expired entries count as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    /// Store a value under the default TTL.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit TTL, sweeping expired entries while
    /// the write lock is held.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Remove one key.
    pub fn delete(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Drop every key touched by a write to the given article: its single-
    /// article, bias, and ensemble keys, plus all list keys (list ordering
    /// depends on composite scores).
    pub fn invalidate_article(&self, article_id: i64) {
        let single = article_key(article_id);
        let bias_prefix = format!("bias:{article_id}:");
        let ensemble = ensemble_key(article_id);

        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|key, _| {
                key != &single
                    && key != &ensemble
                    && !key.starts_with(&bias_prefix)
                    && !key.starts_with("articles:")
            });
    }
}

/// Key for the article list endpoint. Empty filters are spelled out so the
/// key stays stable as filters are added.
pub fn articles_key(source: Option<&str>, leaning: Option<&str>, limit: i64, offset: i64) -> String {
    format!(
        "articles:{}:{}:{limit}:{offset}",
        source.unwrap_or(""),
        leaning.unwrap_or(""),
    )
}

/// Key for a single article.
pub fn article_key(article_id: i64) -> String {
    format!("article:{article_id}")
}

/// Key for the bias endpoint with its filter parameters.
pub fn bias_key(article_id: i64, min: Option<f64>, max: Option<f64>, sort: Option<&str>) -> String {
    format!(
        "bias:{article_id}:{}:{}:{}",
        min.map(|v| v.to_string()).unwrap_or_default(),
        max.map(|v| v.to_string()).unwrap_or_default(),
        sort.unwrap_or(""),
    )
}

/// Key for the ensemble-history endpoint.
pub fn ensemble_key(article_id: i64) -> String {
    format!("ensemble:{article_id}")
}
