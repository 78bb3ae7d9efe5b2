//! Default values for all configuration sections.
//!
//! The defaults ship a three-model ensemble covering the left, center,
//! and right perspectives with equal weight. Users only need to supply an
//! API key.

use super::{CacheConfig, LoggingConfig, ModelConfig, ServerConfig, StorageConfig};

pub(super) fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub(super) fn default_port() -> u16 {
    8080
}

pub(super) fn default_db_path() -> String {
    "~/.newslens/newslens.db".to_string()
}

pub(super) fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

pub(super) fn default_http_timeout_secs() -> u64 {
    60
}

pub(super) fn default_health_probe_timeout_secs() -> u64 {
    2
}

pub(super) fn default_max_retry_attempts() -> u32 {
    3
}

pub(super) fn default_weight() -> f64 {
    1.0
}

pub(super) fn default_cache_ttl_secs() -> u64 {
    30
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            model_name: "meta-llama/llama-3.1-70b-instruct".to_string(),
            weight: 1.0,
            perspective: "left".to_string(),
        },
        ModelConfig {
            model_name: "google/gemini-flash-1.5".to_string(),
            weight: 1.0,
            perspective: "center".to_string(),
        },
        ModelConfig {
            model_name: "openai/gpt-4o-mini".to_string(),
            weight: 1.0,
            perspective: "right".to_string(),
        },
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for super::LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            http_timeout_secs: default_http_timeout_secs(),
            health_probe_timeout_secs: default_health_probe_timeout_secs(),
            max_retry_attempts: default_max_retry_attempts(),
            models: default_models(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
