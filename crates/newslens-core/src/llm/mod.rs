//! LLM scoring abstraction and implementations.
//!
//! Provides a trait-based abstraction for LLM scoring backends with a typed
//! error taxonomy, a deterministic retry/backoff policy, and a translator
//! that maps provider errors to user-facing dispositions shared by the
//! reanalysis pipeline and the HTTP boundary.

pub mod openai_compat;

use crate::error::LlmError;
use std::time::Duration;

/// Article fields the scorer needs, decoupled from the storage row type.
#[derive(Debug, Clone)]
pub struct ScorableArticle {
    /// Article headline.
    pub title: String,
    /// Full article body text.
    pub content: String,
}

/// One model's verdict on an article.
#[derive(Debug, Clone)]
pub struct ModelVerdict {
    /// Political bias score in [-1, 1] (negative = left, positive = right).
    pub score: f64,
    /// The model's self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Short natural-language justification.
    pub explanation: String,
}

/// Trait abstracting LLM scoring operations.
///
/// Implemented by `OpenAiCompatScorer` for real providers and by test
/// stubs. The trait is object-safe for use as `Arc<dyn ArticleScorer>`.
#[async_trait::async_trait]
pub trait ArticleScorer: Send + Sync {
    /// Score one article with the named model.
    async fn score_article(
        &self,
        article: &ScorableArticle,
        model: &str,
    ) -> Result<ModelVerdict, LlmError>;

    /// Cheap liveness probe for the provider credentials.
    async fn validate_key(&self) -> Result<(), LlmError>;

    /// Current per-request timeout.
    fn http_timeout(&self) -> Duration;

    /// Replace the per-request timeout. Used by the orchestrator to shorten
    /// health probes; the previous value must be restored by the caller.
    fn set_http_timeout(&self, timeout: Duration);
}

/// Backoff delay before retry attempt `attempt` (0-based).
///
/// Attempt k sleeps `min(2^k, 16)` seconds, so the schedule runs
/// 1s, 2s, 4s, 8s, 16s, 16s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(16);
    Duration::from_secs(secs)
}

/// User-facing disposition of an LLM error.
///
/// Shared by the orchestrator (progress messages, step tokens) and the HTTP
/// boundary (status codes, error envelopes), so the two stay symmetrical.
#[derive(Debug, Clone)]
pub struct LlmDisposition {
    /// HTTP status the error maps to at the API boundary.
    pub http_status: u16,
    /// Machine-readable error code for the response envelope.
    pub code: &'static str,
    /// Short progress-step token.
    pub step: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Operator guidance, when the failure is actionable.
    pub recommended_action: Option<&'static str>,
    /// Mirror of the provider's Retry-After, when present.
    pub retry_after_seconds: Option<u64>,
}

/// Translate a provider-layer error into its user-facing disposition.
pub fn translate(err: &LlmError) -> LlmDisposition {
    match err {
        LlmError::Authentication { message } => LlmDisposition {
            http_status: 401,
            code: "llm_authentication",
            step: "Authentication error",
            message: format!("LLM authentication failed: {message}"),
            recommended_action: Some("Check the configured LLM API key"),
            retry_after_seconds: None,
        },
        LlmError::Credits { message } => LlmDisposition {
            http_status: 402,
            code: "llm_payment_required",
            step: "Payment required",
            message: format!("LLM provider credits exhausted: {message}"),
            recommended_action: Some("Add credits to the LLM provider account"),
            retry_after_seconds: None,
        },
        LlmError::RateLimited { retry_after_secs } => LlmDisposition {
            http_status: 429,
            code: "llm_rate_limited",
            step: "Rate limited",
            message: format!("LLM rate limited, retry after {retry_after_secs} seconds"),
            recommended_action: Some("Retry after the indicated delay"),
            retry_after_seconds: Some(*retry_after_secs),
        },
        LlmError::Streaming { message } => LlmDisposition {
            http_status: 503,
            code: "llm_streaming",
            step: "Streaming error",
            message: format!("LLM response was cut off: {message}"),
            recommended_action: None,
            retry_after_seconds: None,
        },
        LlmError::NoWorkingModels => LlmDisposition {
            http_status: 503,
            code: "llm_unavailable",
            step: "No working models",
            message: "no working LLM models available".to_string(),
            recommended_action: Some("Check provider status and model configuration"),
            retry_after_seconds: None,
        },
        LlmError::Request(e) => LlmDisposition {
            http_status: 503,
            code: "llm_unavailable",
            step: "Service unavailable",
            message: format!("LLM service unreachable: {e}"),
            recommended_action: Some("Check network connectivity to the LLM provider"),
            retry_after_seconds: None,
        },
        LlmError::Api { status, message } if *status >= 500 => LlmDisposition {
            http_status: 503,
            code: "llm_unavailable",
            step: "Service unavailable",
            message: format!("LLM provider error (status {status}): {message}"),
            recommended_action: None,
            retry_after_seconds: None,
        },
        LlmError::Api { status, message } => LlmDisposition {
            http_status: 500,
            code: "internal",
            step: "Error",
            message: format!("unexpected LLM API response (status {status}): {message}"),
            recommended_action: None,
            retry_after_seconds: None,
        },
        LlmError::Parse(message) => LlmDisposition {
            http_status: 500,
            code: "internal",
            step: "Error",
            message: format!("could not interpret LLM verdict: {message}"),
            recommended_action: None,
            retry_after_seconds: None,
        },
        LlmError::NotConfigured => LlmDisposition {
            http_status: 503,
            code: "llm_unavailable",
            step: "Service unavailable",
            message: "no LLM provider configured".to_string(),
            recommended_action: Some("Configure an LLM provider and API key"),
            retry_after_seconds: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_starts_at_one_second() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_caps_at_sixteen_seconds() {
        assert_eq!(backoff_delay(4), Duration::from_secs(16));
        assert_eq!(backoff_delay(10), Duration::from_secs(16));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(16));
    }

    #[test]
    fn authentication_maps_to_401() {
        let d = translate(&LlmError::Authentication {
            message: "bad key".to_string(),
        });
        assert_eq!(d.http_status, 401);
        assert_eq!(d.code, "llm_authentication");
        assert!(d.recommended_action.is_some());
    }

    #[test]
    fn credits_maps_to_402() {
        let d = translate(&LlmError::Credits {
            message: "balance empty".to_string(),
        });
        assert_eq!(d.http_status, 402);
        assert_eq!(d.code, "llm_payment_required");
    }

    #[test]
    fn rate_limit_maps_to_429_with_retry_after() {
        let d = translate(&LlmError::RateLimited {
            retry_after_secs: 42,
        });
        assert_eq!(d.http_status, 429);
        assert_eq!(d.retry_after_seconds, Some(42));
    }

    #[test]
    fn streaming_maps_to_503() {
        let d = translate(&LlmError::Streaming {
            message: "connection reset mid-body".to_string(),
        });
        assert_eq!(d.http_status, 503);
        assert_eq!(d.code, "llm_streaming");
    }

    #[test]
    fn no_working_models_maps_to_503() {
        let d = translate(&LlmError::NoWorkingModels);
        assert_eq!(d.http_status, 503);
        assert_eq!(d.step, "No working models");
    }

    #[test]
    fn server_side_api_error_maps_to_503() {
        let d = translate(&LlmError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(d.http_status, 503);
    }

    #[test]
    fn client_side_api_error_maps_to_500() {
        let d = translate(&LlmError::Api {
            status: 404,
            message: "model not found".to_string(),
        });
        assert_eq!(d.http_status, 500);
        assert_eq!(d.code, "internal");
    }
}
