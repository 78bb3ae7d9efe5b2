//! Per-article reanalysis progress tracking.
//!
//! A process-wide map from article ID to the latest [`ProgressState`],
//! written only by the reanalysis pipeline (single writer per article) and
//! read concurrently by any number of SSE streamers. States are total
//! overwrites; readers always get a snapshot copy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Lifecycle status of a reanalysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The pipeline is running.
    InProgress,
    /// The run finished successfully (alias kept for stream consumers).
    Success,
    /// The run finished successfully and the final score is available.
    Complete,
    /// The run failed; `error` carries the reason.
    Error,
    /// The run was skipped (`NO_AUTO_ANALYZE` test knob).
    Skipped,
    /// Synthetic status for a just-connected stream with no state yet.
    Connected,
}

impl Status {
    /// Terminal statuses end the run; no further states follow until a new
    /// reanalysis begins.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Complete | Self::Error | Self::Skipped)
    }
}

/// A snapshot of one article's reanalysis progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Short machine token for the current step (e.g. "Queued",
    /// "Scoring with model-a", "Calculating").
    pub step: String,
    /// Human-readable description.
    pub message: String,
    /// Completion percentage in [0, 100], non-decreasing within one run.
    pub percent: f64,
    /// Current lifecycle status.
    pub status: Status,
    /// Failure reason; `None` unless `status` is `Error`.
    pub error: Option<String>,
    /// Final composite score; set on `Complete`/`Success` only.
    pub final_score: Option<f64>,
    /// Unix timestamp (seconds) of the last update.
    pub last_updated: i64,
}

impl ProgressState {
    /// An in-progress state at the given step and percent.
    pub fn in_progress(step: impl Into<String>, message: impl Into<String>, percent: f64) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            percent,
            status: Status::InProgress,
            error: None,
            final_score: None,
            last_updated: 0,
        }
    }

    /// A terminal error state. Percent is carried over from the caller so
    /// the non-decreasing invariant holds.
    pub fn error(step: impl Into<String>, message: impl Into<String>, percent: f64) -> Self {
        let message = message.into();
        Self {
            step: step.into(),
            message: message.clone(),
            percent,
            status: Status::Error,
            error: Some(message),
            final_score: None,
            last_updated: 0,
        }
    }

    /// The terminal completion state carrying the final composite score.
    pub fn complete(final_score: f64) -> Self {
        Self {
            step: "Done".to_string(),
            message: "Analysis complete".to_string(),
            percent: 100.0,
            status: Status::Complete,
            error: None,
            final_score: Some(final_score),
            last_updated: 0,
        }
    }

    /// The terminal skipped state (`NO_AUTO_ANALYZE`).
    pub fn skipped() -> Self {
        Self {
            step: "Skipped".to_string(),
            message: "Automatic analysis disabled".to_string(),
            percent: 100.0,
            status: Status::Skipped,
            error: None,
            final_score: None,
            last_updated: 0,
        }
    }

    /// Synthetic state sent to a stream subscriber before any real state
    /// exists for the article.
    pub fn connected() -> Self {
        Self {
            step: "Initializing".to_string(),
            message: String::new(),
            percent: 0.0,
            status: Status::Connected,
            error: None,
            final_score: None,
            last_updated: 0,
        }
    }
}

/// Process-wide progress map.
///
/// `set` is a linearisable total overwrite; `get` returns the most recently
/// set value or `None`. There is no cross-article ordering guarantee and no
/// blocking wait primitive; streamers poll.
#[derive(Default)]
pub struct ProgressTracker {
    states: RwLock<HashMap<i64, ProgressState>>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the state for an article, stamping `last_updated`.
    pub fn set(&self, article_id: i64, mut state: ProgressState) {
        state.last_updated = chrono::Utc::now().timestamp();
        self.states
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(article_id, state);
    }

    /// Snapshot the current state for an article, if any.
    pub fn get(&self, article_id: i64) -> Option<ProgressState> {
        self.states
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&article_id)
            .cloned()
    }
}
