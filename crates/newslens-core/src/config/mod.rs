//! Configuration management for newslens.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.newslens/config.toml`)
//! 3. Environment variable overrides (`NEWSLENS_` prefix)
//!
//! CLI flag overrides are applied by the binary crate after loading.

mod defaults;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Top-level configuration for the newslens service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Data storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// LLM provider and scoring ensemble configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "defaults::default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "defaults::default_port")]
    pub port: u16,
}

/// Data storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "defaults::default_db_path")]
    pub db_path: String,
}

/// LLM provider configuration, including the scoring ensemble.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    #[serde(default = "defaults::default_base_url")]
    pub base_url: String,

    /// API key for the provider.
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout for scoring calls, in seconds.
    #[serde(default = "defaults::default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Short timeout used for the pre-flight model health probes, in seconds.
    #[serde(default = "defaults::default_health_probe_timeout_secs")]
    pub health_probe_timeout_secs: u64,

    /// Maximum scoring attempts per model (first try + retries).
    #[serde(default = "defaults::default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Ordered list of ensemble models. The orchestrator calls them in
    /// declaration order.
    #[serde(default = "defaults::default_models")]
    pub models: Vec<ModelConfig>,
}

/// One model in the scoring ensemble.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Provider model identifier sent on the wire.
    pub model_name: String,

    /// Aggregation weight (>= 0).
    #[serde(default = "defaults::default_weight")]
    pub weight: f64,

    /// Short perspective tag (e.g. "left", "center", "right"), echoed into
    /// ensemble metadata.
    #[serde(default)]
    pub perspective: String,
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Time-to-live for cached GET responses, in seconds.
    #[serde(default = "defaults::default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Logging and observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set.
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
}

impl LlmConfig {
    /// Look up the configured weight for a model. Models outside the
    /// ensemble (including `summarizer` rows) weigh 0.
    pub fn weight_for(&self, model: &str) -> f64 {
        self.models
            .iter()
            .find(|m| m.model_name == model)
            .map_or(0.0, |m| m.weight)
    }

    /// Look up the perspective tag for a model, if configured.
    pub fn perspective_for(&self, model: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|m| m.model_name == model)
            .map(|m| m.perspective.as_str())
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// The loading sequence:
    /// 1. Determine config file path (argument > `NEWSLENS_CONFIG` env var > default)
    /// 2. Parse TOML file (or use defaults if default path doesn't exist)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.llm.models.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.models".to_string(),
            });
        }

        for model in &self.llm.models {
            if model.model_name.is_empty() {
                errors.push(ConfigError::MissingField {
                    field: "llm.models.model_name".to_string(),
                });
            }
            if model.weight < 0.0 || !model.weight.is_finite() {
                errors.push(ConfigError::InvalidValue {
                    field: "llm.models.weight".to_string(),
                    message: format!(
                        "weight for '{}' must be a finite value >= 0",
                        model.model_name
                    ),
                });
            }
        }

        if self.llm.http_timeout_secs == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "llm.http_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.llm.max_retry_attempts == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "llm.max_retry_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("NEWSLENS_LLM_API_KEY") {
            self.llm.api_key = val;
        }
        if let Ok(val) = env::var("NEWSLENS_LLM_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = env::var("NEWSLENS_DB_PATH") {
            self.storage.db_path = val;
        }
    }

    /// Resolve the config file path. Returns `(path, explicit)` where
    /// `explicit` indicates the path was supplied by the caller or the
    /// environment (a missing explicit file is an error; a missing default
    /// file just means defaults).
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = config_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = env::var("NEWSLENS_CONFIG") {
            return (PathBuf::from(p), true);
        }
        let default = dirs::home_dir()
            .map(|h| h.join(".newslens").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".newslens/config.toml"));
        (default, false)
    }
}

/// Whether background reanalysis is disabled for this process.
///
/// `NO_AUTO_ANALYZE=true` makes the reanalysis endpoint publish a terminal
/// `Skipped` progress state instead of spawning the pipeline. This is the
/// only recognised test knob.
pub fn no_auto_analyze() -> bool {
    env::var("NO_AUTO_ANALYZE").as_deref() == Ok("true")
}
