//! Configuration management for Concierge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - The short variable names used by earlier deployments
//!   (PDF_DIR, INDEX_PATH, OLLAMA_BASE_URL, GOOGLE_CREDS_PATH)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Document store and retrieval configuration
    #[serde(default)]
    pub rag: RagConfig,

    /// Tool-routing agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Google Calendar configuration
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: ollama, openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key (openai provider only)
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: ollama, openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches in flight at once while indexing
    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    /// Directory scanned for PDF files
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,

    /// Directory holding the persisted vector index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks handed to the LLM per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Drop retrieved chunks scoring below this cosine similarity
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Maximum reasoning steps before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget for a single run (0 disables)
    #[serde(default)]
    pub max_execution_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// OAuth client secrets downloaded from the Google console
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Where the authorized token is cached
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Target calendar
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Time zone attached to event start/end
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Length of booked events
    #[serde(default = "default_event_duration")]
    pub event_duration_minutes: i64,

    /// Calendar API base URL
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_calendar_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient API failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// How long to wait for the browser consent redirect
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, concierge_agent=trace, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 300 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_llm_provider() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_llm_model() -> String { crate::DEFAULT_LLM_MODEL.to_string() }
fn default_temperature() -> f32 { 0.0 }
fn default_llm_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 3 }
fn default_embedding_provider() -> String { "ollama".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 32 }
fn default_embedding_concurrency() -> usize { 4 }
fn default_pdf_dir() -> PathBuf { PathBuf::from("pdfs") }
fn default_index_path() -> PathBuf { PathBuf::from("vector_index") }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_top_k() -> usize { 4 }
fn default_max_iterations() -> usize { 15 }
fn default_credentials_path() -> PathBuf { PathBuf::from("google_creds/credentials.json") }
fn default_token_path() -> PathBuf { PathBuf::from("token.json") }
fn default_calendar_id() -> String { "primary".to_string() }
fn default_time_zone() -> String { "UTC".to_string() }
fn default_event_duration() -> i64 { 60 }
fn default_calendar_api_base() -> String { "https://www.googleapis.com/calendar/v3".to_string() }
fn default_calendar_timeout() -> u64 { 30 }
fn default_auth_timeout() -> u64 { 180 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_ollama_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_retries(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_ollama_url(),
            api_key: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_retries(),
            batch_size: default_batch_size(),
            concurrency: default_embedding_concurrency(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_execution_secs: 0,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            calendar_id: default_calendar_id(),
            time_zone: default_time_zone(),
            event_duration_minutes: default_event_duration(),
            api_base: default_calendar_api_base(),
            timeout_secs: default_calendar_timeout(),
            max_retries: default_retries(),
            auth_timeout_secs: default_auth_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

/// Short environment names that map onto nested config keys
const LEGACY_ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("PDF_DIR", &["rag.pdf_dir"]),
    ("FAISS_INDEX_PATH", &["rag.index_path"]),
    ("INDEX_PATH", &["rag.index_path"]),
    ("OLLAMA_BASE_URL", &["llm.base_url", "embedding.base_url"]),
    ("GOOGLE_CREDS_PATH", &["calendar.credentials_path"]),
];

/// One day
const MAX_EVENT_DURATION_MINUTES: i64 = 24 * 60;

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        // Later entries win, so INDEX_PATH beats FAISS_INDEX_PATH
        for (var, keys) in LEGACY_ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                for key in keys.iter() {
                    builder = builder.set_override(*key, value.clone())?;
                }
            }
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific config file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<(), ConfigError> {
        let calendar = &self.calendar;
        if calendar.auth_timeout_secs >= self.server.request_timeout_secs {
            return Err(ConfigError::Message(format!(
                "calendar.auth_timeout_secs ({}) must be shorter than server.request_timeout_secs ({})",
                calendar.auth_timeout_secs, self.server.request_timeout_secs
            )));
        }
        if !(1..=MAX_EVENT_DURATION_MINUTES).contains(&calendar.event_duration_minutes) {
            return Err(ConfigError::Message(format!(
                "calendar.event_duration_minutes must be between 1 and {}, got {}",
                MAX_EVENT_DURATION_MINUTES, calendar.event_duration_minutes
            )));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Location of the serialized index file
    pub fn index_file(&self) -> PathBuf {
        self.rag.index_path.join(crate::index::INDEX_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.embedding.model, "all-minilm");
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.calendar.calendar_id, "primary");
        assert_eq!(config.calendar.event_duration_minutes, 60);
    }

    #[test]
    fn test_index_file_location() {
        let config = AppConfig::default();
        assert_eq!(config.index_file(), PathBuf::from("vector_index/index.json"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[rag]\npdf_dir = \"docs\"\ntop_k = 6\n\n[server]\nport = 9000").unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.rag.pdf_dir, PathBuf::from("docs"));
        assert_eq!(config.rag.top_k, 6);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.calendar.auth_timeout_secs < config.server.request_timeout_secs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_timeout_must_fit_request_timeout() {
        let mut config = AppConfig::default();
        config.calendar.auth_timeout_secs = config.server.request_timeout_secs;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth_timeout_secs"));
    }

    #[test]
    fn test_event_duration_bounds() {
        let mut config = AppConfig::default();
        for minutes in [0, -30, 24 * 60 + 1, i64::MAX] {
            config.calendar.event_duration_minutes = minutes;
            assert!(config.validate().is_err(), "{} minutes accepted", minutes);
        }
        config.calendar.event_duration_minutes = 24 * 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_with_conflicting_timeouts_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nrequest_timeout_secs = 60\n\n[calendar]\nauth_timeout_secs = 120").unwrap();

        assert!(AppConfig::from_file(file.path().to_str().unwrap()).is_err());
    }
}
