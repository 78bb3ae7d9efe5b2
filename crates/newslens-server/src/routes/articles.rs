//! Article endpoints: list, create, fetch, bias, ensemble, and the
//! manual-score override.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use newslens_core::cache;
use newslens_core::error::StorageError;
use newslens_core::storage::articles::{self, Article, NewArticle};
use newslens_core::storage::scores::{self, MODEL_ENSEMBLE};

use super::{parse_article_id, success};
use crate::error::ApiError;
use crate::state::AppState;

const LEANINGS: &[&str] = &["left", "center", "right"];

/// Shape an article row for API responses. Unscored articles surface
/// `composite: 0.0` / `confidence: 0.0` rather than nulls.
fn article_json(article: &Article) -> Value {
    json!({
        "id": article.id,
        "source": article.source,
        "url": article.url,
        "title": article.title,
        "content": article.content,
        "pub_date": article.pub_date,
        "created_at": article.created_at,
        "status": article.status,
        "composite": article.composite_score.unwrap_or(0.0),
        "confidence": article.confidence.unwrap_or(0.0),
        "score_source": article.score_source,
    })
}

/// Query parameters for the list endpoint.
#[derive(Deserialize)]
pub struct ListQuery {
    /// Filter by feed/publisher name.
    pub source: Option<String>,
    /// Filter by leaning bucket: left, center, or right.
    pub leaning: Option<String>,
    /// Page size, 1-100 (default 20).
    pub limit: Option<i64>,
    /// Page offset, >= 0 (default 0).
    pub offset: Option<i64>,
}

/// `GET /api/articles` — list articles ordered by composite score.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(20);
    if !(1..=100).contains(&limit) {
        return Err(ApiError::BadRequest(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must be >= 0".to_string()));
    }
    if let Some(leaning) = params.leaning.as_deref() {
        if !LEANINGS.contains(&leaning) {
            return Err(ApiError::BadRequest(format!(
                "leaning must be one of left, center, right (got '{leaning}')"
            )));
        }
    }

    let source = params.source.as_deref();
    let leaning = params.leaning.as_deref();
    let key = cache::articles_key(source, leaning, limit, offset);

    let payload = match state.cache.get(&key) {
        Some(cached) => cached,
        None => {
            let rows = articles::fetch_articles(&state.db, source, leaning, limit, offset).await?;
            let total = articles::count_articles(&state.db, source, leaning).await?;
            let payload = json!({
                "total": total,
                "articles": rows.iter().map(article_json).collect::<Vec<_>>(),
            });
            state.cache.set(key, payload.clone());
            payload
        }
    };

    let total = payload["total"].as_i64().unwrap_or(0);
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Total-Count",
        HeaderValue::from_str(&total.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    Ok((headers, success(payload["articles"].clone())).into_response())
}

/// Request body for creating an article.
#[derive(Deserialize)]
pub struct CreateArticleRequest {
    /// Feed or publisher name (non-empty).
    pub source: String,
    /// Canonical URL, `http://` or `https://`.
    pub url: String,
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Full body text.
    #[serde(default)]
    pub content: String,
    /// RFC-3339 publication timestamp.
    pub pub_date: String,
}

/// `POST /api/articles` — create an article.
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateArticleRequest>,
) -> Result<Response, ApiError> {
    if body.source.trim().is_empty() {
        return Err(ApiError::BadRequest("source is required".to_string()));
    }
    if !body.url.starts_with("http://") && !body.url.starts_with("https://") {
        return Err(ApiError::BadRequest(
            "url must start with http:// or https://".to_string(),
        ));
    }
    if chrono::DateTime::parse_from_rfc3339(&body.pub_date).is_err() {
        return Err(ApiError::BadRequest(
            "pub_date must be an RFC-3339 timestamp".to_string(),
        ));
    }

    // Up-front duplicate check; the unique index on `url` still backstops
    // concurrent inserts.
    if articles::article_exists_by_url(&state.db, &body.url).await? {
        return Err(StorageError::DuplicateUrl { url: body.url }.into());
    }

    let id = articles::insert_article(
        &state.db,
        &NewArticle {
            source: body.source.trim().to_string(),
            url: body.url,
            title: body.title,
            content: body.content,
            pub_date: body.pub_date,
        },
    )
    .await?;

    // New rows shift the list ordering; drop stale list pages.
    state.cache.invalidate_article(id);

    Ok((StatusCode::CREATED, success(json!({ "id": id }))).into_response())
}

/// Query parameters for the single-article endpoint.
#[derive(Deserialize)]
pub struct GetArticleQuery {
    /// Cache-busting token; any value bypasses the response cache.
    #[serde(rename = "_t")]
    pub cache_bust: Option<String>,
}

/// `GET /api/articles/{id}` — fetch one article.
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<GetArticleQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_article_id(&id)?;
    let key = cache::article_key(id);

    if params.cache_bust.is_none() {
        if let Some(cached) = state.cache.get(&key) {
            return Ok(success(cached));
        }
    }

    let article = articles::fetch_article_by_id(&state.db, id).await?;
    let payload = article_json(&article);
    state.cache.set(key, payload.clone());

    Ok(success(payload))
}

/// Request body for the manual-score endpoint. The body must contain
/// exactly `{score}`; unknown fields are rejected.
fn parse_manual_score_body(body: &Value) -> Result<f64, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("body must be a JSON object".to_string()))?;

    if object.len() != 1 || !object.contains_key("score") {
        return Err(ApiError::BadRequest(
            "body must contain exactly {\"score\": number}".to_string(),
        ));
    }

    let score = object["score"]
        .as_f64()
        .ok_or_else(|| ApiError::BadRequest("score must be a number".to_string()))?;

    if !(-1.0..=1.0).contains(&score) {
        return Err(ApiError::BadRequest(format!(
            "score {score} outside valid range [-1, 1]"
        )));
    }

    Ok(score)
}

/// `POST /api/manual-score/{id}` — direct-score override.
pub async fn manual_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_article_id(&id)?;
    let score = parse_manual_score_body(&body)?;

    state.reanalyzer.apply_manual_score(id, score).await?;

    Ok(success(json!({ "id": id, "score": score, "score_source": "manual" })))
}

/// Query parameters for the bias endpoint.
#[derive(Deserialize)]
pub struct BiasQuery {
    /// Keep only per-model results with score >= this bound.
    pub min_score: Option<f64>,
    /// Keep only per-model results with score <= this bound.
    pub max_score: Option<f64>,
    /// Sort per-model results by score: `asc` or `desc`.
    pub sort: Option<String>,
}

/// `GET /api/articles/{id}/bias` — composite score plus per-model results.
pub async fn bias(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<BiasQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_article_id(&id)?;

    for (name, bound) in [("min_score", params.min_score), ("max_score", params.max_score)] {
        if let Some(value) = bound {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ApiError::BadRequest(format!(
                    "{name} must be within [-1, 1]"
                )));
            }
        }
    }
    if let Some(sort) = params.sort.as_deref() {
        if sort != "asc" && sort != "desc" {
            return Err(ApiError::BadRequest(
                "sort must be 'asc' or 'desc'".to_string(),
            ));
        }
    }

    let key = cache::bias_key(id, params.min_score, params.max_score, params.sort.as_deref());
    if let Some(cached) = state.cache.get(&key) {
        return Ok(success(cached));
    }

    let article = articles::fetch_article_by_id(&state.db, id).await?;
    let rows = scores::fetch_llm_scores(&state.db, id).await?;

    let mut results: Vec<(f64, Value)> = rows
        .iter()
        .filter(|r| r.model != MODEL_ENSEMBLE)
        .filter(|r| params.min_score.map_or(true, |min| r.score >= min))
        .filter(|r| params.max_score.map_or(true, |max| r.score <= max))
        .map(|r| {
            (
                r.score,
                json!({
                    "model": r.model,
                    "score": r.score,
                    "confidence": r.confidence(),
                    "explanation": r.explanation(),
                    "created_at": r.created_at,
                }),
            )
        })
        .collect();

    match params.sort.as_deref() {
        Some("asc") => results.sort_by(|a, b| a.0.total_cmp(&b.0)),
        Some("desc") => results.sort_by(|a, b| b.0.total_cmp(&a.0)),
        _ => {}
    }

    let mut payload = json!({
        "composite_score": article.composite_score,
        "results": results.into_iter().map(|(_, v)| v).collect::<Vec<_>>(),
    });
    if article.composite_score.is_none() {
        payload["status"] = json!("scoring_unavailable");
    }

    state.cache.set(key, payload.clone());

    Ok(success(payload))
}

/// `GET /api/articles/{id}/ensemble` — ensemble score history.
pub async fn ensemble(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_article_id(&id)?;

    let key = cache::ensemble_key(id);
    if let Some(cached) = state.cache.get(&key) {
        return Ok(success(cached));
    }

    // 404 for unknown articles, not an empty history.
    articles::fetch_article_by_id(&state.db, id).await?;

    let rows = scores::fetch_ensemble_scores(&state.db, id).await?;
    let entries: Vec<Value> = rows
        .iter()
        .map(|row| {
            let metadata = row.metadata_json();
            json!({
                "score": row.score,
                "sub_results": metadata.get("sub_results").cloned().unwrap_or(json!([])),
                "aggregation": metadata.get("final_aggregation").cloned().unwrap_or(json!({})),
                "created_at": row.created_at,
            })
        })
        .collect();

    let payload = json!({ "scores": entries });
    state.cache.set(key, payload.clone());

    Ok(success(payload))
}
