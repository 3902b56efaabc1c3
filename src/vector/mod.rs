//! Per-collection vector index with a remote backend and a local fallback.
//!
//! [`VectorIndex`] wraps an optional [`VectorBackend`]. Whenever the backend is
//! missing or reports [`Availability::Unavailable`], searches are answered by
//! scanning the embeddings kept in the [`KnowledgeStore`] instead. Either way the
//! caller gets results in the same shape and a [`SearchMode`] saying which path
//! served them.

pub mod qdrant;
pub mod scan;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::knowledge::types::SearchMode;
use crate::storage::{ChunkFilter, KnowledgeStore};
use crate::types::{Availability, Metadata};

#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Metadata,
}

/// A durable similarity index keyed by collection.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Availability<()>;
    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Availability<()>;
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Availability<Vec<ScoredPoint>>;
    async fn delete_points(&self, collection: &str, ids: &[String]) -> Availability<()>;
    async fn delete_collection(&self, collection: &str) -> Availability<()>;
}

/// Create the configured backend, or `None` when `backend = "none"`.
pub fn create_backend(
    config: &crate::config::VectorConfig,
) -> anyhow::Result<Option<Arc<dyn VectorBackend>>> {
    match config.backend.to_ascii_lowercase().as_str() {
        "none" => Ok(None),
        "qdrant" => {
            let backend =
                qdrant::QdrantBackend::new(&config.url, Duration::from_secs(config.timeout_secs))?;
            Ok(Some(Arc::new(backend)))
        }
        other => anyhow::bail!("unknown vector backend: {other}. Supported: qdrant, none"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSearch {
    pub points: Vec<ScoredPoint>,
    pub mode: SearchMode,
}

pub struct VectorIndex {
    backend: Option<Arc<dyn VectorBackend>>,
    store: Arc<dyn KnowledgeStore>,
}

impl VectorIndex {
    pub fn new(backend: Option<Arc<dyn VectorBackend>>, store: Arc<dyn KnowledgeStore>) -> Self {
        if let Some(b) = &backend {
            info!(backend = b.name(), "vector index using remote backend");
        }
        Self { backend, store }
    }

    /// Push points to the backend. The store already holds the vectors, so a
    /// failed upsert only means later searches take the fallback path.
    pub async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> SearchMode {
        let Some(b) = &self.backend else {
            return SearchMode::Fallback;
        };
        let Some(dimension) = points.first().map(|p| p.vector.len()) else {
            return SearchMode::Remote;
        };
        if let Availability::Unavailable(_) = b.ensure_collection(collection, dimension).await {
            return SearchMode::Fallback;
        }
        remote_or_fallback(b.upsert(collection, points).await)
    }

    /// Top-`k` points in `collection` scoring at least `threshold`, highest first.
    pub async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<IndexSearch> {
        if let Some(b) = &self.backend {
            match b.search(collection, query, k, threshold).await {
                Availability::Available(points) => {
                    // The backend's ordering and threshold are not trusted blindly.
                    let points = scan::finalize(
                        points.into_iter().map(|p| {
                            let score = p.score;
                            (p, score)
                        }).collect(),
                        k,
                        threshold,
                    )
                    .into_iter()
                    .map(|(p, _)| p)
                    .collect();
                    return Ok(IndexSearch {
                        points,
                        mode: SearchMode::Remote,
                    });
                }
                Availability::Unavailable(reason) => {
                    warn!(collection, %reason, "vector search falling back to local scan");
                }
            }
        }

        let points = self.scan(&ChunkFilter::embedded_in(collection), query, k, threshold)?;
        Ok(IndexSearch {
            points,
            mode: SearchMode::Fallback,
        })
    }

    /// Scan stored chunk embeddings matching `filter` in process.
    pub fn scan(
        &self,
        filter: &ChunkFilter,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredPoint>> {
        let chunks = self.store.list_chunks(filter)?;
        debug!(candidates = chunks.len(), "scanning stored embeddings");
        let hits = scan::top_k(
            chunks
                .iter()
                .filter_map(|c| c.embedding.as_deref().map(|e| (c, e))),
            query,
            k,
            threshold,
        );
        Ok(hits
            .into_iter()
            .map(|(chunk, score)| ScoredPoint {
                id: chunk.id.clone(),
                score,
                payload: chunk.payload(),
            })
            .collect())
    }

    /// Best-effort removal of points from the backend.
    pub async fn delete_points(&self, collection: &str, ids: &[String]) {
        if let Some(b) = &self.backend {
            if let Availability::Unavailable(reason) = b.delete_points(collection, ids).await {
                warn!(collection, %reason, "could not remove points from vector backend");
            }
        }
    }

    /// Best-effort removal of a whole collection from the backend.
    pub async fn drop_collection(&self, collection: &str) {
        if let Some(b) = &self.backend {
            if let Availability::Unavailable(reason) = b.delete_collection(collection).await {
                warn!(collection, %reason, "could not drop vector collection");
            }
        }
    }
}

fn remote_or_fallback(result: Availability<()>) -> SearchMode {
    match result {
        Availability::Available(()) => SearchMode::Remote,
        Availability::Unavailable(_) => SearchMode::Fallback,
    }
}
