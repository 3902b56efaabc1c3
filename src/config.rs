use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::chunking::{ChunkMethod, ChunkingStrategy};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RecollectConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ollama: OllamaConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Ollama serves both embeddings (`/api/embed`) and summaries (`/api/chat`).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub summary_model: String,
    pub timeout_secs: u64,
    pub summary_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VectorConfig {
    /// `"qdrant"` for the remote index, `"none"` to always scan locally.
    pub backend: String,
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub default_score_threshold: f32,
    pub rag_score_threshold: f32,
    pub rag_max_tokens: usize,
    pub chunk_method: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub summarize_threshold_chars: usize,
    pub context_limit: usize,
    pub context_min_importance: f64,
    pub consolidation_max_age_hours: u32,
    pub consolidation_importance_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_recollect_dir()
            .join("recollect.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            embedding_model: "nomic-embed-text".into(),
            summary_model: "llama3.2".into(),
            timeout_secs: 30,
            summary_timeout_secs: 60,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: "qdrant".into(),
            url: "http://localhost:6333".into(),
            timeout_secs: 10,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            default_score_threshold: 0.0,
            rag_score_threshold: 0.5,
            rag_max_tokens: 2000,
            chunk_method: "paragraph".into(),
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summarize_threshold_chars: 500,
            context_limit: 20,
            context_min_importance: 0.3,
            consolidation_max_age_hours: 24,
            consolidation_importance_threshold: 0.3,
        }
    }
}

/// Returns `~/.recollect/`, or `./.recollect/` when no home directory is known.
pub fn default_recollect_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recollect")
}

/// Returns the default config file path: `~/.recollect/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recollect_dir().join("config.toml")
}

impl RecollectConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecollectConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (RECOLLECT_DB, RECOLLECT_LOG_LEVEL, OLLAMA_HOST, QDRANT_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECOLLECT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("OLLAMA_HOST") {
            self.ollama.base_url = val;
        }
        if let Ok(val) = std::env::var("QDRANT_URL") {
            self.vector.url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// The configured default chunking strategy. Unknown method names fall
    /// back to paragraph mode; sizes are validated at ingestion.
    pub fn default_chunking(&self) -> ChunkingStrategy {
        ChunkingStrategy {
            method: ChunkMethod::from_name(&self.retrieval.chunk_method),
            chunk_size: self.retrieval.chunk_size,
            chunk_overlap: self.retrieval.chunk_overlap,
        }
    }

    pub fn vector_backend_enabled(&self) -> bool {
        !self.vector.backend.eq_ignore_ascii_case("none")
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RecollectConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.retrieval.rag_score_threshold, 0.5);
        assert_eq!(config.memory.summarize_threshold_chars, 500);
        assert_eq!(config.memory.context_limit, 20);
        assert!(config.storage.db_path.ends_with("recollect.db"));
        assert!(config.vector_backend_enabled());
        assert!(config.default_chunking().validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[vector]
backend = "none"

[retrieval]
chunk_method = "sentence"
chunk_size = 256
"#;
        let config: RecollectConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert!(!config.vector_backend_enabled());

        let strategy = config.default_chunking();
        assert_eq!(strategy.method, ChunkMethod::Sentence);
        assert_eq!(strategy.chunk_size, 256);
        // defaults still apply for unset fields
        assert_eq!(strategy.chunk_overlap, 50);
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RecollectConfig::default();
        std::env::set_var("RECOLLECT_DB", "/tmp/override.db");
        std::env::set_var("RECOLLECT_LOG_LEVEL", "trace");
        std::env::set_var("OLLAMA_HOST", "http://gpu-box:11434");
        std::env::set_var("QDRANT_URL", "http://qdrant:6333");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.vector.url, "http://qdrant:6333");

        // Clean up
        std::env::remove_var("RECOLLECT_DB");
        std::env::remove_var("RECOLLECT_LOG_LEVEL");
        std::env::remove_var("OLLAMA_HOST");
        std::env::remove_var("QDRANT_URL");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
    }
}
