//! Integration tests for the newslens-server API routes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use newslens_core::analysis::Reanalyzer;
use newslens_core::cache::ResponseCache;
use newslens_core::config::{Config, ModelConfig};
use newslens_core::error::LlmError;
use newslens_core::llm::{ArticleScorer, ModelVerdict, ScorableArticle};
use newslens_core::progress::{ProgressState, ProgressTracker, Status};
use newslens_core::storage;

use newslens_server::state::AppState;

/// Stub scorer: health probes (recognised by their fixed title) succeed
/// unless `fail_all` is set; real scoring replays the configured per-model
/// score or the configured error.
struct StubScorer {
    scores: Vec<(String, f64)>,
    confidence: f64,
    error: Option<fn() -> LlmError>,
    fail_all: bool,
    timeout: std::sync::RwLock<Duration>,
}

impl StubScorer {
    fn healthy(scores: &[(&str, f64)], confidence: f64) -> Self {
        Self {
            scores: scores.iter().map(|(m, s)| ((*m).to_string(), *s)).collect(),
            confidence,
            error: None,
            fail_all: false,
            timeout: std::sync::RwLock::new(Duration::from_secs(60)),
        }
    }

    fn failing(error: fn() -> LlmError) -> Self {
        Self {
            scores: Vec::new(),
            confidence: 0.0,
            error: Some(error),
            fail_all: true,
            timeout: std::sync::RwLock::new(Duration::from_secs(60)),
        }
    }
}

#[async_trait::async_trait]
impl ArticleScorer for StubScorer {
    async fn score_article(
        &self,
        article: &ScorableArticle,
        model: &str,
    ) -> Result<ModelVerdict, LlmError> {
        if self.fail_all {
            let make_error = self.error.expect("failing stub has an error");
            return Err(make_error());
        }
        if article.title == "Health probe" {
            return Ok(ModelVerdict {
                score: 0.0,
                confidence: 1.0,
                explanation: String::new(),
            });
        }

        let score = self
            .scores
            .iter()
            .find(|(m, _)| m == model)
            .map_or(0.0, |(_, s)| *s);
        Ok(ModelVerdict {
            score,
            confidence: self.confidence,
            explanation: format!("verdict from {model}"),
        })
    }

    async fn validate_key(&self) -> Result<(), LlmError> {
        match self.error {
            Some(make_error) => Err(make_error()),
            None => Ok(()),
        }
    }

    fn http_timeout(&self) -> Duration {
        *self.timeout.read().expect("lock")
    }

    fn set_http_timeout(&self, timeout: Duration) {
        *self.timeout.write().expect("lock") = timeout;
    }
}

fn three_model_config() -> Config {
    let mut config = Config::default();
    config.llm.models = vec![
        ModelConfig {
            model_name: "left-model".to_string(),
            weight: 1.0,
            perspective: "left".to_string(),
        },
        ModelConfig {
            model_name: "center-model".to_string(),
            weight: 1.0,
            perspective: "center".to_string(),
        },
        ModelConfig {
            model_name: "right-model".to_string(),
            weight: 1.0,
            perspective: "right".to_string(),
        },
    ];
    config
}

/// Create the test router backed by an in-memory SQLite database.
async fn test_app(scorer: StubScorer) -> (axum::Router, Arc<AppState>) {
    let pool = storage::init_test_db().await.expect("init test db");
    let config = Arc::new(three_model_config());
    let scorer: Arc<dyn ArticleScorer> = Arc::new(scorer);
    let progress = Arc::new(ProgressTracker::new());
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(30)));

    let reanalyzer = Arc::new(Reanalyzer::new(
        pool.clone(),
        Arc::clone(&scorer),
        Arc::clone(&progress),
        Arc::clone(&cache),
        Arc::clone(&config),
    ));

    let state = Arc::new(AppState {
        db: pool,
        scorer,
        progress,
        cache,
        reanalyzer,
    });

    (newslens_server::build_router(Arc::clone(&state)), state)
}

async fn test_router() -> axum::Router {
    test_app(StubScorer::healthy(&[], 0.8)).await.0
}

/// Helper: send a GET request and parse JSON from the response.
async fn get_json(router: axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    let status = response.status();
    let body = response.into_body().collect().await.expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body.to_bytes()).expect("parse JSON");

    (status, json)
}

/// Helper: send a POST request with a JSON body.
async fn post_json(
    router: axum::Router,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&bytes.to_bytes()).expect("parse JSON");

    (status, json)
}

fn sample_article_body(url: &str) -> serde_json::Value {
    serde_json::json!({
        "source": "src",
        "pub_date": "2024-01-01T00:00:00Z",
        "url": url,
        "title": "t",
        "content": "c",
    })
}

/// Create an article through the API and return its ID.
async fn create_article(router: &axum::Router, url: &str) -> i64 {
    let (status, json) = post_json(router.clone(), "/api/articles", sample_article_body(url)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["data"]["id"].as_i64().expect("article id")
}

/// Poll the progress tracker until the article reaches a terminal status.
async fn wait_for_terminal(state: &Arc<AppState>, article_id: i64) -> ProgressState {
    for _ in 0..500 {
        if let Some(progress) = state.progress.get(article_id) {
            if progress.status.is_terminal() {
                return progress;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("reanalysis for article {article_id} never reached a terminal state");
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn health_returns_ok() {
    let router = test_router().await;
    let (status, json) = get_json(router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], serde_json::json!(true));
    assert_eq!(json["data"]["status"], "ok");
}

// ============================================================
// Articles: create + fetch
// ============================================================

#[tokio::test]
async fn create_then_fetch_defaults_to_zero_scores() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;

    let id = create_article(&router, "http://e/a").await;
    assert!(id > 0);

    let (status, json) = get_json(router, &format!("/api/articles/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["composite"], serde_json::json!(0.0));
    assert_eq!(json["data"]["confidence"], serde_json::json!(0.0));
    assert_eq!(json["data"]["status"], "pending");
    assert!(json["data"]["score_source"].is_null());
}

#[tokio::test]
async fn duplicate_url_conflicts() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;

    create_article(&router, "http://e/a").await;
    let (status, json) = post_json(router, "/api/articles", sample_article_body("http://e/a")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], serde_json::json!(false));
    assert_eq!(json["error"]["code"], "duplicate_url");
}

#[tokio::test]
async fn create_rejects_bad_url_and_bad_pub_date() {
    let router = test_router().await;

    let mut body = sample_article_body("ftp://e/a");
    let (status, json) = post_json(router.clone(), "/api/articles", body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    body = sample_article_body("http://e/b");
    body["pub_date"] = serde_json::json!("yesterday");
    let (status, _) = post_json(router, "/api/articles", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fetch_unknown_article_is_404_and_bad_id_is_400() {
    let router = test_router().await;

    let (status, json) = get_json(router.clone(), "/api/articles/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");

    let (status, json) = get_json(router, "/api/articles/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

// ============================================================
// Articles: listing
// ============================================================

#[tokio::test]
async fn list_sets_total_count_header() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    create_article(&router, "http://e/a").await;
    create_article(&router, "http://e/b").await;

    let req = Request::builder()
        .uri("/api/articles")
        .body(Body::empty())
        .expect("build request");
    let response = router.oneshot(req).await.expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Total-Count").expect("header"),
        "2"
    );
}

#[tokio::test]
async fn list_validates_limit_offset_and_leaning() {
    let router = test_router().await;

    let (status, _) = get_json(router.clone(), "/api/articles?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(router.clone(), "/api/articles?limit=101").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(router.clone(), "/api/articles?offset=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(router, "/api/articles?leaning=upward").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================
// Manual score override
// ============================================================

#[tokio::test]
async fn manual_override_updates_score_and_busts_cache() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    // Seed the cache with the unscored article.
    let (_, before) = get_json(router.clone(), &format!("/api/articles/{id}")).await;
    assert_eq!(before["data"]["composite"], serde_json::json!(0.0));

    let (status, _) = post_json(
        router.clone(),
        &format!("/api/manual-score/{id}"),
        serde_json::json!({"score": 0.5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The very next read sees the new score without waiting out the TTL.
    let (status, after) = get_json(router, &format!("/api/articles/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["data"]["composite"], serde_json::json!(0.5));
    assert_eq!(after["data"]["confidence"], serde_json::json!(1.0));
    assert_eq!(after["data"]["score_source"], "manual");
}

#[tokio::test]
async fn manual_override_rejects_out_of_range_and_extra_fields() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, json) = post_json(
        router.clone(),
        &format!("/api/manual-score/{id}"),
        serde_json::json!({"score": 1.5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (status, _) = post_json(
        router.clone(),
        &format!("/api/manual-score/{id}"),
        serde_json::json!({"score": 0.5, "confidence": 0.9}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        router,
        "/api/manual-score/999",
        serde_json::json!({"score": 0.5}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================
// Bias endpoint
// ============================================================

#[tokio::test]
async fn bias_without_scores_reports_scoring_unavailable() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, json) = get_json(router, &format!("/api/articles/{id}/bias")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["composite_score"].is_null());
    assert_eq!(json["data"]["status"], "scoring_unavailable");
    assert_eq!(json["data"]["results"], serde_json::json!([]));
}

#[tokio::test]
async fn bias_validates_filters() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, _) = get_json(
        router.clone(),
        &format!("/api/articles/{id}/bias?min_score=-2"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(router, &format!("/api/articles/{id}/bias?sort=sideways")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================
// Reanalysis pipeline (stubbed scorer)
// ============================================================

#[tokio::test]
async fn reanalyze_happy_path_completes_and_exposes_ensemble() {
    let scorer = StubScorer::healthy(
        &[("left-model", -0.4), ("center-model", 0.0), ("right-model", 0.6)],
        0.8,
    );
    let (router, state) = test_app(scorer).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, json) = post_json(
        router.clone(),
        &format!("/api/llm/reanalyze/{id}"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "reanalysis queued");

    let terminal = wait_for_terminal(&state, id).await;
    assert_eq!(terminal.status, Status::Complete);
    assert!((terminal.percent - 100.0).abs() < f64::EPSILON);
    let final_score = terminal.final_score.expect("final score");
    assert!((final_score - 0.2 / 3.0).abs() < 1e-9);

    // The composite is visible on the article without waiting out the TTL.
    let (_, article) = get_json(router.clone(), &format!("/api/articles/{id}")).await;
    assert!((article["data"]["composite"].as_f64().expect("composite") - 0.2 / 3.0).abs() < 1e-9);
    assert_eq!(article["data"]["score_source"], "llm");

    let (status, ensemble) = get_json(router, &format!("/api/articles/{id}/ensemble")).await;
    assert_eq!(status, StatusCode::OK);
    let scores = ensemble["data"]["scores"].as_array().expect("scores");
    assert_eq!(scores.len(), 1);
    assert_eq!(
        scores[0]["sub_results"].as_array().expect("sub_results").len(),
        3
    );
}

#[tokio::test]
async fn reanalyze_with_score_takes_the_override_path() {
    let (router, state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, json) = post_json(
        router.clone(),
        &format!("/api/llm/reanalyze/{id}"),
        serde_json::json!({"score": -0.25}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "score updated");

    // No progress events on the override path.
    assert!(state.progress.get(id).is_none());

    let (_, article) = get_json(router, &format!("/api/articles/{id}")).await;
    assert_eq!(article["data"]["composite"], serde_json::json!(-0.25));
    assert_eq!(article["data"]["score_source"], "manual");
}

#[tokio::test]
async fn reanalyze_unknown_article_is_404() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let (status, _) = post_json(router, "/api/llm/reanalyze/999", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reanalyze_with_auth_failure_publishes_error_and_health_maps_to_401() {
    let scorer = StubScorer::failing(|| LlmError::Authentication {
        message: "invalid api key".to_string(),
    });
    let (router, state) = test_app(scorer).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, _) = post_json(
        router.clone(),
        &format!("/api/llm/reanalyze/{id}"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let terminal = wait_for_terminal(&state, id).await;
    assert_eq!(terminal.status, Status::Error);

    // The prior (unscored) state survives the failed run.
    let (_, article) = get_json(router.clone(), &format!("/api/articles/{id}?_t=1")).await;
    assert_eq!(article["data"]["status"], "pending");

    let (status, json) = get_json(router, "/api/llm/health").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "llm_authentication");
    assert!(json["error"]["recommended_action"].is_string());
}

#[tokio::test]
async fn llm_health_rate_limit_carries_retry_after() {
    let scorer = StubScorer::failing(|| LlmError::RateLimited {
        retry_after_secs: 30,
    });
    let (router, _state) = test_app(scorer).await;

    let req = Request::builder()
        .uri("/api/llm/health")
        .body(Body::empty())
        .expect("build request");
    let response = router.oneshot(req).await.expect("send request");

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("Retry-After").expect("header"), "30");

    let bytes = response.into_body().collect().await.expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&bytes.to_bytes()).expect("parse JSON");
    assert_eq!(json["error"]["details"]["retry_after_seconds"], 30);
}

#[tokio::test]
async fn llm_health_ok() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let (status, json) = get_json(router, "/api/llm/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
}

// ============================================================
// SSE progress endpoint
// ============================================================

#[tokio::test]
async fn score_progress_responds_with_event_stream_headers() {
    let (router, state) = test_app(StubScorer::healthy(&[], 0.8)).await;

    // A terminal state keeps the stream short.
    state.progress.set(1, ProgressState::skipped());

    let req = Request::builder()
        .uri("/api/llm/score-progress/1")
        .body(Body::empty())
        .expect("build request");
    let response = router.oneshot(req).await.expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .expect("content type"),
        "text/event-stream"
    );
    assert_eq!(
        response.headers().get("cache-control").expect("cache control"),
        "no-cache"
    );

    let bytes = response.into_body().collect().await.expect("read body");
    let body = String::from_utf8(bytes.to_bytes().to_vec()).expect("utf8");
    assert!(body.contains("event: progress"), "got: {body}");
    assert!(body.contains("data:"), "got: {body}");
    assert!(body.contains("\"Skipped\""));
}

// ============================================================
// Feedback
// ============================================================

#[tokio::test]
async fn feedback_roundtrip_and_validation() {
    let (router, _state) = test_app(StubScorer::healthy(&[], 0.8)).await;
    let id = create_article(&router, "http://e/a").await;

    let (status, json) = post_json(
        router.clone(),
        "/api/feedback",
        serde_json::json!({
            "article_id": id,
            "user_id": "user-1",
            "feedback_text": "score feels off",
            "category": "disagree",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["feedback_id"].as_i64().expect("id") > 0);

    // Missing required field.
    let (status, _) = post_json(
        router.clone(),
        "/api/feedback",
        serde_json::json!({"article_id": id, "user_id": "user-1", "feedback_text": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown category.
    let (status, _) = post_json(
        router.clone(),
        "/api/feedback",
        serde_json::json!({
            "article_id": id,
            "user_id": "user-1",
            "feedback_text": "hm",
            "category": "meh",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nonexistent article.
    let (status, _) = post_json(
        router,
        "/api/feedback",
        serde_json::json!({
            "article_id": 999,
            "user_id": "user-1",
            "feedback_text": "hm",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================
// Feeds
// ============================================================

#[tokio::test]
async fn feeds_healthz_maps_names_to_booleans() {
    let (router, state) = test_app(StubScorer::healthy(&[], 0.8)).await;

    newslens_core::storage::feeds::upsert_feed_source(&state.db, "reuters", "http://feeds/r")
        .await
        .expect("upsert");
    newslens_core::storage::feeds::upsert_feed_source(&state.db, "apnews", "http://feeds/a")
        .await
        .expect("upsert");
    newslens_core::storage::feeds::record_fetch_outcome(&state.db, "apnews", false)
        .await
        .expect("record");

    let (status, json) = get_json(router, "/api/feeds/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reuters"], serde_json::json!(true));
    assert_eq!(json["data"]["apnews"], serde_json::json!(false));
}
