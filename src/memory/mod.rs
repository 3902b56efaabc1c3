//! Memory subsystem: typed entries, sessions, ranked recall, context building,
//! and consolidation of aged session memories.
//!
//! [`MemoryStore`] is the entry point. Its operations are spread across the
//! submodules by concern:
//!
//! - [`store`]: write path, get, delete, importance updates
//! - [`search`]: semantic and keyword ranking, context building
//! - [`session`]: session lifecycle and summaries
//! - [`maintenance`]: the [`Consolidator`](maintenance::Consolidator)
//! - [`stats`]: counts by kind and session activity

pub mod maintenance;
pub mod search;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;

use std::sync::Arc;

use crate::config::RecollectConfig;
use crate::embedding::EmbeddingProvider;
use crate::storage::MemoryRepository;
use crate::summarizer::Summarizer;

/// Tunables for [`MemoryStore`], usually taken from [`RecollectConfig`].
#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub embedding_model: String,
    pub summary_model: String,
    /// `auto_summarize` writes longer than this many characters get a summary.
    pub summarize_threshold_chars: usize,
    pub context_limit: usize,
    pub context_min_importance: f64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::from_config(&RecollectConfig::default())
    }
}

impl MemorySettings {
    pub fn from_config(config: &RecollectConfig) -> Self {
        Self {
            embedding_model: config.ollama.embedding_model.clone(),
            summary_model: config.ollama.summary_model.clone(),
            summarize_threshold_chars: config.memory.summarize_threshold_chars,
            context_limit: config.memory.context_limit,
            context_min_importance: config.memory.context_min_importance,
        }
    }
}

pub struct MemoryStore {
    repo: Arc<dyn MemoryRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn Summarizer>,
    settings: MemorySettings,
}

impl MemoryStore {
    pub fn new(
        repo: Arc<dyn MemoryRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
        settings: MemorySettings,
    ) -> Self {
        Self {
            repo,
            embedder,
            summarizer,
            settings,
        }
    }

    /// A consolidator sharing this store's repository and summarizer.
    pub fn consolidator(&self) -> maintenance::Consolidator {
        maintenance::Consolidator::new(
            Arc::clone(&self.repo),
            Arc::clone(&self.summarizer),
            self.settings.summary_model.clone(),
        )
    }
}
