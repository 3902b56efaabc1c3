//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an Ollama implementation. The
//! provider is created via [`create_provider`] from configuration.
//!
//! Providers never fail hard: an unreachable service, a timeout, or an empty
//! vector all come back as [`Availability::Unavailable`].

pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Availability;

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text with the named model.
    async fn embed(&self, text: &str, model: &str) -> Availability<Vec<f32>>;

    /// Embed many texts concurrently. The output is index-aligned with the
    /// input regardless of completion order.
    async fn embed_many(&self, texts: &[String], model: &str) -> Vec<Availability<Vec<f32>>> {
        futures::future::join_all(texts.iter().map(|t| self.embed(t, model))).await
    }
}

/// Create an embedding provider from config.
///
/// Ollama is the only provider; the trait is the seam for tests and for
/// alternative backends.
pub fn create_provider(
    config: &crate::config::OllamaConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = ollama::OllamaEmbedder::new(
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(provider))
}
