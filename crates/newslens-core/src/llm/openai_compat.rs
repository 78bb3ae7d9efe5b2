//! OpenAI-compatible LLM scorer.
//!
//! Works with OpenAI, OpenRouter, and any endpoint speaking the chat
//! completions format. Each scoring call asks the model for a strict JSON
//! verdict and classifies HTTP failures into the typed error taxonomy.

use super::{ArticleScorer, ModelVerdict, ScorableArticle};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a political bias rater for news articles. \
Respond with a single JSON object and nothing else: \
{\"score\": <number in [-1,1], negative = left-leaning, positive = right-leaning>, \
\"confidence\": <number in [0,1]>, \"explanation\": <one or two sentences>}";

/// An LLM scorer using the OpenAI chat completions API format.
pub struct OpenAiCompatScorer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: RwLock<Duration>,
}

impl OpenAiCompatScorer {
    /// Create a new scorer against an OpenAI-compatible endpoint.
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            timeout: RwLock::new(timeout),
        }
    }

    fn classify_status(status: u16, body: String) -> LlmError {
        match status {
            401 | 403 => LlmError::Authentication { message: body },
            402 => LlmError::Credits { message: body },
            _ => LlmError::Api {
                status,
                message: body,
            },
        }
    }
}

#[async_trait::async_trait]
impl ArticleScorer for OpenAiCompatScorer {
    async fn score_article(
        &self,
        article: &ScorableArticle,
        model: &str,
    ) -> Result<ModelVerdict, LlmError> {
        tracing::debug!(model, title = %article.title, "LLM scoring request");

        let request = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Title: {}\n\n{}", article.title, article.content),
                },
            ],
            max_tokens: 512,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.http_timeout())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        // A failure from here on means the response body was cut off or
        // otherwise unreadable, which is the streaming error class.
        let body: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Streaming {
                message: e.to_string(),
            })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))?;

        let verdict = parse_verdict(&content)?;

        tracing::debug!(
            model,
            score = verdict.score,
            confidence = verdict.confidence,
            "LLM verdict",
        );

        Ok(verdict)
    }

    async fn validate_key(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.http_timeout())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, body))
    }

    fn http_timeout(&self) -> Duration {
        *self.timeout.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_http_timeout(&self, timeout: Duration) {
        *self
            .timeout
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = timeout;
    }
}

/// Parse a model's verdict, tolerating markdown code fences around the JSON.
fn parse_verdict(content: &str) -> Result<ModelVerdict, LlmError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.trim_end_matches("```"));

    let raw: RawVerdict = serde_json::from_str(stripped.trim())
        .map_err(|e| LlmError::Parse(format!("{e}: {trimmed}")))?;

    Ok(ModelVerdict {
        score: raw.score.clamp(-1.0, 1.0),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        explanation: raw.explanation.unwrap_or_default(),
    })
}

// --- Internal Serde types ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    score: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}
