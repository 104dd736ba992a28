//! Configuration management for Shrike
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (SHRIKE_*)
//! 3. Config file (~/.config/shrike/config.toml)
//! 4. Default values
//!
//! The config is built once at startup and passed by reference into every
//! stage constructor; nothing reads it from global state.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Text-generation backend settings (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the completions API
    pub base_url: String,
    pub model: String,
    /// Low temperature keeps review output near-deterministic
    pub temperature: f64,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5-coder:7b-instruct".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Embedding backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Expected vector width; mismatched responses are rejected
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "bge-large".to_string(),
            dimension: 1024,
        }
    }
}

/// Vector index settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorConfig {
    pub url: String,
    /// Collection holding embedded repository chunks
    pub code_collection: String,
    /// Collection holding convention/style-guide statements
    pub conventions_collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            code_collection: "code_embeddings".to_string(),
            conventions_collection: "conventions".to_string(),
        }
    }
}

/// Rerank scoring backend; absent URL disables second-pass scoring and
/// fusion falls back to source-priority ordering
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RerankConfig {
    pub url: Option<String>,
}

/// Retrieval tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Local-context snippets per hunk
    pub local_top_k: usize,
    /// Similar-code snippets per hunk
    pub similar_top_k: usize,
    /// Convention statements per hunk
    pub conventions_top_k: usize,
    /// Fused evidence kept after reranking
    pub rerank_top_k: usize,
    /// Minimum first-pass similarity for similar-code hits
    pub min_similarity: f64,
    /// Minimum first-pass similarity for convention hits
    pub conventions_min_similarity: f64,
    /// Lines of surrounding file content per local snippet, each side
    pub context_lines: u32,
    /// Per-source fetch timeout
    #[serde(with = "humantime_serde")]
    pub source_timeout: Duration,
    /// Hunks processed concurrently
    pub worker_pool: usize,
    /// Hunks longer than this are split before review (0 disables)
    pub max_hunk_lines: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            local_top_k: 3,
            similar_top_k: 3,
            conventions_top_k: 2,
            rerank_top_k: 10,
            min_similarity: 0.7,
            conventions_min_similarity: 0.6,
            context_lines: 10,
            source_timeout: Duration::from_secs(10),
            worker_pool: 4,
            max_hunk_lines: 200,
        }
    }
}

/// Approval gate settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReviewConfig {
    /// How long to wait for a human decision before failing closed to
    /// reject; no timeout means wait indefinitely
    #[serde(with = "humantime_serde")]
    pub gate_timeout: Option<Duration>,
}

/// Notification settings; the webhook URL itself lives in secrets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub channel: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: None,
        }
    }
}

/// Audit record persistence settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Directory audit records are written into
    pub data_dir: PathBuf,
    /// Save attempts before the run is declared incomplete
    pub max_attempts: u32,
    /// Backoff between attempts, doubled each retry
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/review_runs"),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub rerank: RerankConfig,
    pub retrieval: RetrievalConfig,
    pub review: ReviewConfig,
    pub notify: NotifyConfig,
    pub persist: PersistConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/shrike/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("shrike").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - SHRIKE_LLM_URL: completions API base URL
    /// - SHRIKE_LLM_MODEL: generation model name
    /// - SHRIKE_VECTOR_URL: vector index URL
    /// - SHRIKE_DATA_DIR: audit record directory
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SHRIKE_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("SHRIKE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("SHRIKE_VECTOR_URL") {
            self.vector.url = url;
        }
        if let Ok(dir) = std::env::var("SHRIKE_DATA_DIR") {
            self.persist.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        llm_model: Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(model) = llm_model {
            self.llm.model = model;
        }
        if let Some(dir) = data_dir {
            self.persist.data_dir = dir;
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        llm_model: Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(llm_model, data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retrieval.local_top_k, 3);
        assert_eq!(config.retrieval.similar_top_k, 3);
        assert_eq!(config.retrieval.conventions_top_k, 2);
        assert_eq!(config.retrieval.rerank_top_k, 10);
        assert_eq!(config.llm.temperature, 0.1);
        assert!(config.rerank.url.is_none());
        assert!(config.review.gate_timeout.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default()
            .with_cli_overrides(Some("llama3:8b".to_string()), Some(PathBuf::from("/tmp/runs")));

        assert_eq!(config.llm.model, "llama3:8b");
        assert_eq!(config.persist.data_dir, PathBuf::from("/tmp/runs"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[llm]
base_url = "http://gpu-box:11434/v1"
model = "qwen2.5-coder:32b"
timeout = "3m"

[retrieval]
rerank_top_k = 5
source_timeout = "30s"

[rerank]
url = "http://localhost:9037"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.base_url, "http://gpu-box:11434/v1");
        assert_eq!(config.llm.timeout, Duration::from_secs(180));
        assert_eq!(config.retrieval.rerank_top_k, 5);
        assert_eq!(config.retrieval.source_timeout, Duration::from_secs(30));
        assert_eq!(config.rerank.url.as_deref(), Some("http://localhost:9037"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
[vector]
url = "http://qdrant.internal:6333"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.vector.url, "http://qdrant.internal:6333");
        // Untouched sections keep defaults
        assert_eq!(config.vector.code_collection, "code_embeddings");
        assert_eq!(config.retrieval.local_top_k, 3);
        assert_eq!(config.persist.max_attempts, 3);
    }

    #[test]
    fn test_gate_timeout_parses() {
        let toml = r#"
[review]
gate_timeout = "15m"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.review.gate_timeout, Some(Duration::from_secs(900)));
    }
}
