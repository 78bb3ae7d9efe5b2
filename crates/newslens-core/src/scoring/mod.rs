//! Composite score engine.
//!
//! Aggregates per-model bias verdicts into a single signed composite score
//! in [-1, 1] plus a confidence estimate in [0, 1]. Aggregation is a
//! confidence-weighted mean: each input contributes `(s, c, w)` where `s`
//! is the model's score, `c` its self-reported confidence, and `w` the
//! configured ensemble weight for that model. Models outside the configured
//! ensemble (including `summarizer` rows) carry weight 0 and so never
//! influence the result.

use crate::config::LlmConfig;
use crate::error::ScoringError;

/// One model's contribution to the composite, decoupled from the storage
/// row type.
#[derive(Debug, Clone)]
pub struct ScoredInput {
    /// Model identifier, matched against the ensemble config.
    pub model: String,
    /// Bias score in [-1, 1].
    pub score: f64,
    /// Self-reported confidence in [0, 1]; 0 when the row carried none.
    pub confidence: f64,
}

/// The aggregated result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composite {
    /// Signed bias value, clamped to [-1, 1].
    pub score: f64,
    /// Weighted mean of per-model confidences, clamped to [0, 1].
    pub confidence: f64,
}

/// Aggregate per-model inputs into a composite score.
///
/// Let `W = Σ w_i·c_i`. Fails with [`ScoringError::NoValidScores`] when
/// `W = 0` (no configured model contributed a usable confidence).
/// Otherwise:
///
/// - `score = clamp(Σ w_i·c_i·s_i / W, -1, 1)`
/// - `confidence = clamp(W / Σ w_i, 0, 1)`
///
/// Input order is irrelevant; the operation is commutative.
pub fn composite(inputs: &[ScoredInput], cfg: &LlmConfig) -> Result<Composite, ScoringError> {
    let mut weighted_sum = 0.0;
    let mut effective_weight = 0.0;
    let mut total_weight = 0.0;

    for input in inputs {
        let w = cfg.weight_for(&input.model);
        let c = input.confidence.clamp(0.0, 1.0);
        weighted_sum += w * c * input.score;
        effective_weight += w * c;
        total_weight += w;
    }

    if effective_weight == 0.0 {
        return Err(ScoringError::NoValidScores);
    }

    Ok(Composite {
        score: (weighted_sum / effective_weight).clamp(-1.0, 1.0),
        confidence: (effective_weight / total_weight).clamp(0.0, 1.0),
    })
}
