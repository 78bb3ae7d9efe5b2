//! Reanalysis orchestrator.
//!
//! Drives the per-article scoring pipeline: health-probe the configured
//! models, clear prior per-model rows, score with each model in declared
//! order (with retry/backoff), aggregate with the composite engine, persist
//! the ensemble row and the article's composite score, and invalidate the
//! response cache. Progress is published to the [`ProgressTracker`] after
//! every transition; all failures fold into a single terminal `Error`
//! state through one boundary.

use crate::cache::ResponseCache;
use crate::config::{no_auto_analyze, Config};
use crate::error::{LlmError, StorageError};
use crate::llm::{backoff_delay, translate, ArticleScorer, ModelVerdict, ScorableArticle};
use crate::progress::{ProgressState, ProgressTracker};
use crate::scoring::{self, ScoredInput};
use crate::storage::articles::{self, SCORE_SOURCE_LLM, SCORE_SOURCE_MANUAL};
use crate::storage::scores::{self, MODEL_ENSEMBLE};
use crate::storage::DbPool;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A failed pipeline run, carried to the terminal publisher.
#[derive(Debug)]
struct PipelineFailure {
    step: String,
    message: String,
    percent: f64,
}

impl PipelineFailure {
    fn new(step: impl Into<String>, message: impl Into<String>, percent: f64) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            percent,
        }
    }

    fn from_llm(err: &LlmError, percent: f64) -> Self {
        let disposition = translate(err);
        Self::new(disposition.step, disposition.message, percent)
    }

    fn from_storage(err: &StorageError, percent: f64) -> Self {
        Self::new("Error", err.to_string(), percent)
    }
}

/// Orchestrates reanalyses and the direct-score override path.
///
/// One instance is shared process-wide. Concurrent reanalyses of the same
/// article serialize on a per-article async mutex; distinct articles never
/// contend.
pub struct Reanalyzer {
    pool: DbPool,
    scorer: Arc<dyn ArticleScorer>,
    progress: Arc<ProgressTracker>,
    cache: Arc<ResponseCache>,
    config: Arc<Config>,
    article_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Reanalyzer {
    /// Create a new orchestrator.
    pub fn new(
        pool: DbPool,
        scorer: Arc<dyn ArticleScorer>,
        progress: Arc<ProgressTracker>,
        cache: Arc<ResponseCache>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            pool,
            scorer,
            progress,
            cache,
            config,
            article_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The shared progress tracker (read by SSE streamers).
    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Queue a full reanalysis as a background task.
    ///
    /// Publishes the initial `Queued` state synchronously so a streamer
    /// connecting right after the HTTP response sees it. When
    /// `NO_AUTO_ANALYZE=true` the pipeline is skipped and a terminal
    /// `Skipped` state is published instead.
    pub fn queue_reanalysis(self: &Arc<Self>, article_id: i64) {
        self.progress.set(
            article_id,
            ProgressState::in_progress("Queued", "Reanalysis queued", 0.0),
        );

        if no_auto_analyze() {
            self.progress.set(article_id, ProgressState::skipped());
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // Inner spawn gives a panic boundary: an unexpected panic in the
            // pipeline still produces a terminal Error state.
            let runner = Arc::clone(&this);
            let handle = tokio::spawn(async move { runner.reanalyze(article_id).await });
            if let Err(join_err) = handle.await {
                if join_err.is_panic() {
                    tracing::error!(article_id, "reanalysis task panicked");
                    this.progress.set(
                        article_id,
                        ProgressState::error("Error", format!("internal failure: {join_err}"), 0.0),
                    );
                }
            }
        });
    }

    /// Run a full reanalysis to its terminal state.
    ///
    /// This is the high-level entry point; [`Self::queue_reanalysis`] drives
    /// it in the background, and library callers may await it directly.
    pub async fn reanalyze(&self, article_id: i64) {
        let lock = self.article_lock(article_id).await;
        let _guard = lock.lock().await;

        match self.run_pipeline(article_id).await {
            Ok(final_score) => {
                self.cache.invalidate_article(article_id);
                self.progress
                    .set(article_id, ProgressState::complete(final_score));
                tracing::info!(article_id, final_score, "reanalysis complete");
            }
            Err(failure) => {
                tracing::warn!(
                    article_id,
                    step = %failure.step,
                    error = %failure.message,
                    "reanalysis failed"
                );
                self.progress.set(
                    article_id,
                    ProgressState::error(failure.step, failure.message, failure.percent),
                );
            }
        }
    }

    /// Direct-score override: set the composite from a caller-supplied
    /// value with confidence 1.0 and `score_source = "manual"`, then
    /// invalidate the cache. No progress events are emitted on this path.
    pub async fn apply_manual_score(&self, article_id: i64, score: f64) -> Result<(), StorageError> {
        articles::update_article_score(&self.pool, article_id, score, 1.0, SCORE_SOURCE_MANUAL)
            .await?;
        self.cache.invalidate_article(article_id);
        Ok(())
    }

    async fn article_lock(&self, article_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.article_locks.lock().await;
        Arc::clone(locks.entry(article_id).or_default())
    }

    async fn run_pipeline(&self, article_id: i64) -> Result<f64, PipelineFailure> {
        self.publish(article_id, "Starting", "Starting analysis", 0.0);

        let llm_cfg = &self.config.llm;
        if llm_cfg.models.is_empty() {
            return Err(PipelineFailure::new(
                "Error",
                "no models configured for scoring",
                0.0,
            ));
        }
        let total_steps = llm_cfg.models.len() + 3;
        let mut percent = 0.0;

        let article = articles::fetch_article_by_id(&self.pool, article_id)
            .await
            .map_err(|e| PipelineFailure::from_storage(&e, percent))?;
        let scorable = ScorableArticle {
            title: article.title.clone(),
            content: article.content.clone(),
        };

        self.probe_models()
            .await
            .map_err(|e| PipelineFailure::from_llm(&e, percent))?;

        scores::delete_llm_scores_except_ensemble(&self.pool, article_id)
            .await
            .map_err(|e| PipelineFailure::from_storage(&e, percent))?;
        percent = pct(1, total_steps);
        self.publish(article_id, "Preparing", "Cleared previous model scores", percent);

        let mut verdicts: Vec<(String, ModelVerdict)> = Vec::new();
        for (index, model) in llm_cfg.models.iter().enumerate() {
            percent = pct(index + 2, total_steps);
            self.publish(
                article_id,
                format!("Scoring with {}", model.model_name),
                format!("Scoring with {}", model.model_name),
                percent,
            );

            match self.score_with_retries(&scorable, &model.model_name, percent).await {
                Ok(verdict) => {
                    scores::insert_llm_score(
                        &self.pool,
                        article_id,
                        &model.model_name,
                        verdict.score,
                        &json!({
                            "confidence": verdict.confidence,
                            "explanation": verdict.explanation,
                        }),
                    )
                    .await
                    .map_err(|e| PipelineFailure::from_storage(&e, percent))?;
                    verdicts.push((model.model_name.clone(), verdict));
                }
                Err(ScoreAttemptError::Fatal(failure)) => return Err(failure),
                Err(ScoreAttemptError::Exhausted(err)) => {
                    // Transient failures that outlive the retry budget skip
                    // the model; the ensemble aggregates whatever remains.
                    tracing::warn!(
                        article_id,
                        model = %model.model_name,
                        error = %err,
                        "model skipped after exhausting retries"
                    );
                }
            }
        }

        percent = pct(total_steps - 2, total_steps);
        self.publish(article_id, "Calculating", "Aggregating model scores", percent);

        let rows = scores::fetch_llm_scores(&self.pool, article_id)
            .await
            .map_err(|e| PipelineFailure::from_storage(&e, percent))?;
        let inputs: Vec<ScoredInput> = rows
            .iter()
            .filter(|r| r.model != MODEL_ENSEMBLE)
            .map(|r| ScoredInput {
                model: r.model.clone(),
                score: r.score,
                confidence: r.confidence(),
            })
            .collect();

        let composite = scoring::composite(&inputs, llm_cfg)
            .map_err(|e| PipelineFailure::new("Calculating", e.to_string(), percent))?;

        percent = pct(total_steps - 1, total_steps);
        self.publish(article_id, "Storing results", "Persisting scores", percent);

        let metadata = ensemble_metadata(&self.config, &verdicts, composite.score, composite.confidence);
        scores::insert_llm_score(
            &self.pool,
            article_id,
            MODEL_ENSEMBLE,
            composite.score,
            &metadata,
        )
        .await
        .map_err(|e| PipelineFailure::from_storage(&e, percent))?;

        articles::update_article_score(
            &self.pool,
            article_id,
            composite.score,
            composite.confidence,
            SCORE_SOURCE_LLM,
        )
        .await
        .map_err(|e| PipelineFailure::from_storage(&e, percent))?;

        Ok(composite.score)
    }

    /// Probe each configured model in order with a short timeout until one
    /// answers. The regular timeout is restored no matter how the probing
    /// ends.
    async fn probe_models(&self) -> Result<(), LlmError> {
        let llm_cfg = &self.config.llm;
        let prior = self.scorer.http_timeout();
        self.scorer
            .set_http_timeout(Duration::from_secs(llm_cfg.health_probe_timeout_secs));

        let probe = ScorableArticle {
            title: "Health probe".to_string(),
            content: "Reply with a neutral verdict.".to_string(),
        };

        let mut selected = None;
        for model in &llm_cfg.models {
            match self.scorer.score_article(&probe, &model.model_name).await {
                Ok(_) => {
                    selected = Some(model.model_name.clone());
                    break;
                }
                Err(e) => {
                    tracing::debug!(model = %model.model_name, error = %e, "health probe failed");
                }
            }
        }

        self.scorer.set_http_timeout(prior);

        match selected {
            Some(model) => {
                tracing::debug!(primary = %model, "health probe selected primary model");
                Ok(())
            }
            None => Err(LlmError::NoWorkingModels),
        }
    }

    async fn score_with_retries(
        &self,
        article: &ScorableArticle,
        model: &str,
        percent: f64,
    ) -> Result<ModelVerdict, ScoreAttemptError> {
        let max_attempts = self.config.llm.max_retry_attempts.max(1);

        let mut attempt = 0u32;
        loop {
            match self.scorer.score_article(article, model).await {
                Ok(verdict) => return Ok(verdict),
                Err(err) if !err.is_retriable() => {
                    return Err(ScoreAttemptError::Fatal(PipelineFailure::from_llm(
                        &err, percent,
                    )));
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(ScoreAttemptError::Exhausted(err));
                    }
                    let delay = backoff_delay(attempt - 1);
                    tracing::debug!(
                        model,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "transient scoring failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn publish(
        &self,
        article_id: i64,
        step: impl Into<String>,
        message: impl Into<String>,
        percent: f64,
    ) {
        self.progress
            .set(article_id, ProgressState::in_progress(step, message, percent));
    }
}

/// How one model's scoring attempt sequence ended.
enum ScoreAttemptError {
    /// Authentication/credits failure: abort the whole run.
    Fatal(PipelineFailure),
    /// Transient failures outlived the retry budget: skip this model.
    Exhausted(LlmError),
}

/// Progress percent for step `step` of `total`, rounded.
fn pct(step: usize, total: usize) -> f64 {
    (step as f64 / total as f64 * 100.0).round()
}

/// Build the ensemble row metadata: per-model `sub_results` in declared
/// ensemble order plus the aggregation parameters used.
fn ensemble_metadata(
    config: &Config,
    verdicts: &[(String, ModelVerdict)],
    composite: f64,
    confidence: f64,
) -> serde_json::Value {
    let sub_results: Vec<serde_json::Value> = config
        .llm
        .models
        .iter()
        .filter_map(|model| {
            verdicts
                .iter()
                .find(|(name, _)| name == &model.model_name)
                .map(|(name, verdict)| {
                    json!({
                        "model": name,
                        "score": verdict.score,
                        "confidence": verdict.confidence,
                        "explanation": verdict.explanation,
                        "perspective": model.perspective,
                    })
                })
        })
        .collect();

    let weights: serde_json::Map<String, serde_json::Value> = config
        .llm
        .models
        .iter()
        .map(|m| (m.model_name.clone(), json!(m.weight)))
        .collect();

    json!({
        "sub_results": sub_results,
        "final_aggregation": {
            "composite_score": composite,
            "confidence": confidence,
            "weights": weights,
        },
    })
}
