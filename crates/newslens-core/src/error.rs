//! Error types for the newslens core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from scoring articles with remote LLM providers.
///
/// The orchestrator treats `Authentication` and `Credits` as fatal;
/// everything else is retried on the backoff schedule.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed before a response arrived.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the API key (HTTP 401/403).
    #[error("LLM authentication failed: {message}")]
    Authentication {
        /// The error message from the provider.
        message: String,
    },

    /// The account is out of credits (HTTP 402).
    #[error("LLM provider credits exhausted: {message}")]
    Credits {
        /// The error message from the provider.
        message: String,
    },

    /// LLM provider rate limit hit (HTTP 429).
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The response body was cut off or could not be read in full.
    #[error("LLM streaming failure: {message}")]
    Streaming {
        /// Details about the partial response.
        message: String,
    },

    /// Any other LLM API error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// A complete response arrived but the verdict inside it was malformed.
    #[error("failed to parse LLM verdict: {0}")]
    Parse(String),

    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,

    /// Every configured model failed its health probe.
    #[error("no working LLM models available")]
    NoWorkingModels,
}

impl LlmError {
    /// Whether the orchestrator may retry after this error.
    ///
    /// Authentication and credit failures never recover on their own, so
    /// retrying them only burns the caller's time.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::Credits { .. } | Self::NotConfigured => false,
            Self::Api { status, .. } => *status >= 500,
            Self::Request(_)
            | Self::RateLimited { .. }
            | Self::Streaming { .. }
            | Self::Parse(_) => true,
            Self::NoWorkingModels => false,
        }
    }
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// The requested article does not exist.
    #[error("article {id} not found")]
    ArticleNotFound {
        /// The article ID that was looked up.
        id: i64,
    },

    /// An article with the same URL already exists.
    #[error("article with URL '{url}' already exists")]
    DuplicateUrl {
        /// The conflicting URL.
        url: String,
    },

    /// A score outside [-1, 1] was rejected before reaching the database.
    #[error("score {score} outside valid range [-1, 1]")]
    InvalidScore {
        /// The rejected value.
        score: f64,
    },
}

/// Errors from the composite score engine.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Every input row carried zero effective weight.
    #[error("no valid scores to aggregate")]
    NoValidScores,
}
