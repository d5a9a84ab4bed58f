use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DomainError, GuardrailConfig, RetryConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub retrieval_retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Text generation service (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Embedding service used to vectorize queries
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

/// Chroma vector index
#[derive(Debug, Clone, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(default = "default_chroma_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    "demo-rag".to_string()
}

fn default_index_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            api_key: None,
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            api_key: None,
            model: default_embedding_model(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_chroma_url(),
            collection: default_collection(),
            timeout_secs: default_index_timeout_secs(),
        }
    }
}

impl VectorIndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Layered load: `config/default`, `config/local`, then `RAG_*` env vars
    /// (`RAG_GUARDRAIL__THRESHOLD_MODE=strict`)
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("RAG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<(), DomainError> {
        self.guardrail.validate()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DomainError::configuration(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 || self.vector_index.timeout_secs == 0 {
            return Err(DomainError::configuration("timeouts must be greater than 0"));
        }

        if self.vector_index.collection.trim().is_empty() {
            return Err(DomainError::configuration(
                "vector_index.collection cannot be empty",
            ));
        }

        Ok(())
    }
}
