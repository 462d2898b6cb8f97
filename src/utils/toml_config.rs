//! TOML-based configuration for Agora
//!
//! Everything has a default, so a missing `agora.toml` still yields a working
//! local setup (Ollama + DuckDuckGo + Wikipedia, checkpoints in `./data`).
//! Secrets are never stored in the file; providers name the environment
//! variable that holds them.

use crate::llm::Provider;
use crate::llm::throttle::ThrottleConfig;
use crate::research::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on panel size and per-interview turns.
pub const MAX_ANALYSTS: usize = 10;
pub const MAX_TURNS: usize = 10;

/// Root configuration structure loaded from agora.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgoraConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local libSQL file for run checkpoints, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "./data/agora.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Run-wide cap on in-flight generation calls
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_concurrent_calls() -> usize {
    4
}

fn default_acquire_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            temperature: default_temperature(),
            max_concurrent_calls: default_max_concurrent_calls(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub web: bool,

    #[serde(default = "default_true")]
    pub wikipedia: bool,

    /// Snippets requested from each lookup per question
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    3
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            web: true,
            wikipedia: true,
            max_results: default_max_results(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_analyst_count")]
    pub analyst_count: usize,

    #[serde(default = "default_turn_budget")]
    pub turn_budget: usize,

    #[serde(default = "default_max_parallel_interviews")]
    pub max_parallel_interviews: usize,

    /// Park new runs at `awaiting_approval` after the panel is drafted
    #[serde(default = "default_true")]
    pub require_approval: bool,

    #[serde(default = "default_interview_timeout")]
    pub interview_timeout_secs: u64,

    /// Phrases that end an interview early when they appear in an answer
    #[serde(default = "default_close_out_phrases")]
    pub close_out_phrases: Vec<String>,
}

fn default_analyst_count() -> usize {
    3
}

fn default_turn_budget() -> usize {
    2
}

fn default_max_parallel_interviews() -> usize {
    4
}

fn default_interview_timeout() -> u64 {
    600
}

fn default_close_out_phrases() -> Vec<String> {
    vec!["thank you so much for your help".to_string()]
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            analyst_count: default_analyst_count(),
            turn_budget: default_turn_budget(),
            max_parallel_interviews: default_max_parallel_interviews(),
            require_approval: true,
            interview_timeout_secs: default_interview_timeout(),
            close_out_phrases: default_close_out_phrases(),
        }
    }
}

// ============= Retry Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Per-attempt timeout for a single capability call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_call_timeout() -> u64 {
    120
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            jitter: true,
            call_timeout_secs: default_call_timeout(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl AgoraConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(path)) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AgoraConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges and cross-field constraints.
    ///
    /// Provider secrets are checked lazily in [`AgoraConfig::provider`], so
    /// commands that never talk to a model (status, report) work without them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let research = &self.research;
        if research.analyst_count == 0 || research.analyst_count > MAX_ANALYSTS {
            return Err(ConfigError::ValidationError(format!(
                "research.analyst_count must be between 1 and {}, got {}",
                MAX_ANALYSTS, research.analyst_count
            )));
        }
        if research.turn_budget > MAX_TURNS {
            return Err(ConfigError::ValidationError(format!(
                "research.turn_budget must be at most {}, got {}",
                MAX_TURNS, research.turn_budget
            )));
        }
        if research.max_parallel_interviews == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_parallel_interviews must be at least 1".to_string(),
            ));
        }
        if self.llm.max_concurrent_calls == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.retry.backoff_factor
            )));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        if !self.search.web && !self.search.wikipedia {
            tracing::warn!("All lookups are disabled; answers will not be grounded in evidence");
        }
        Ok(())
    }

    /// Resolve the configured provider, reading its API key from the environment.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        let temperature = self.llm.temperature;
        match &self.llm.provider {
            ProviderConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
                temperature,
            }),
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => {
                let api_key = std::env::var(api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(api_key_env.clone()))?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                    temperature,
                })
            }
        }
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_concurrent_calls: self.llm.max_concurrent_calls,
            acquire_timeout: Duration::from_secs(self.llm.acquire_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            jitter: self.retry.jitter,
            call_timeout: Duration::from_secs(self.retry.call_timeout_secs),
        }
    }
}
