//! Knowledge base: collections, document ingestion, semantic search, and RAG
//! context assembly.
//!
//! [`KnowledgeBase`] drives the chunker, the embedding provider, and the
//! [`VectorIndex`]. Collaborator outages never fail a call: a chunk that could
//! not be embedded is stored without a vector, and a query that could not be
//! embedded yields an empty result tagged [`SearchMode::EmbeddingUnavailable`].

pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunking::{chunk_text, ChunkingStrategy};
use crate::config::RecollectConfig;
use crate::context::{self, Passage};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::storage::{ChunkFilter, KnowledgeStore};
use crate::types::{new_id, Availability, MetaValue};
use crate::vector::{ScoredPoint, VectorBackend, VectorIndex, VectorPoint};

use types::*;

/// Tunables for [`KnowledgeBase`], usually taken from [`RecollectConfig`].
#[derive(Debug, Clone)]
pub struct KnowledgeSettings {
    pub default_embedding_model: String,
    pub default_chunking: ChunkingStrategy,
    pub rag_score_threshold: f32,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self::from_config(&RecollectConfig::default())
    }
}

impl KnowledgeSettings {
    pub fn from_config(config: &RecollectConfig) -> Self {
        Self {
            default_embedding_model: config.ollama.embedding_model.clone(),
            default_chunking: config.default_chunking(),
            rag_score_threshold: config.retrieval.rag_score_threshold,
        }
    }
}

/// Deterministic chunk id: a UUID v5 of `"{document_id}:{ordinal}"`.
///
/// Re-ingesting a document under the same id reproduces the same chunk ids,
/// and the UUID form is accepted as a point id by the vector backend.
pub fn chunk_id(document_id: &str, ordinal: u32) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{document_id}:{ordinal}").as_bytes()).to_string()
}

pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: KnowledgeSettings,
}

impl KnowledgeBase {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        backend: Option<Arc<dyn VectorBackend>>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: KnowledgeSettings,
    ) -> Self {
        Self {
            index: VectorIndex::new(backend, Arc::clone(&store)),
            store,
            embedder,
            settings,
        }
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    // --- collections ---

    pub async fn create_collection(&self, request: CreateCollection) -> Result<Collection> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        let now = Utc::now();
        let collection = Collection {
            id: new_id("col"),
            name: name.to_string(),
            description: request.description,
            embedding_model: request
                .embedding_model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.settings.default_embedding_model.clone()),
            document_count: 0,
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.put_collection(&collection)?;
        info!(collection_id = %collection.id, name = %collection.name, model = %collection.embedding_model, "collection created");
        Ok(collection)
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        self.store.list_collections()
    }

    pub fn get_collection(&self, id: &str) -> Result<Collection> {
        self.store
            .get_collection(id)?
            .ok_or_else(|| Error::not_found("collection", id))
    }

    /// Delete a collection with all its documents and chunks.
    pub async fn delete_collection(&self, id: &str) -> Result<()> {
        if !self.store.delete_collection(id)? {
            return Err(Error::not_found("collection", id));
        }
        self.index.drop_collection(id).await;
        info!(collection_id = %id, "collection deleted");
        Ok(())
    }

    // --- documents ---

    /// Chunk, embed, and index one document.
    ///
    /// Chunks whose embedding fails are stored without a vector and left out
    /// of the index; the report and the document record both carry the
    /// embedded count next to the total.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let strategy = request.strategy.unwrap_or(self.settings.default_chunking);
        strategy.validate()?;
        if request.filename.trim().is_empty() {
            return Err(Error::validation("filename", "must not be empty"));
        }
        let mut collection = self.get_collection(&request.collection_id)?;

        let document_id = match request.document_id {
            Some(id) => {
                if let Some(existing) = self.store.get_document(&id)? {
                    if existing.collection_id != collection.id {
                        return Err(Error::validation(
                            "document_id",
                            format!("{id} belongs to collection {}", existing.collection_id),
                        ));
                    }
                    debug!(document_id = %id, "replacing existing document");
                    self.remove_document(&existing, &mut collection).await?;
                }
                id
            }
            None => new_id("doc"),
        };

        let pieces = chunk_text(&request.text, &strategy);
        let embeddings = self
            .embedder
            .embed_many(&pieces, &collection.embedding_model)
            .await;

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| {
                let ordinal = i as u32;
                let mut metadata = request.metadata.clone();
                metadata.insert("filename".into(), MetaValue::from(request.filename.as_str()));
                metadata.insert("chunk_index".into(), MetaValue::Int(i64::from(ordinal)));
                Chunk {
                    id: chunk_id(&document_id, ordinal),
                    document_id: document_id.clone(),
                    collection_id: collection.id.clone(),
                    ordinal,
                    content,
                    embedding: embedding.ok(),
                    metadata,
                }
            })
            .collect();

        let embedded = chunks.iter().filter(|c| c.embedding.is_some()).count();
        let skipped = chunks.len() - embedded;

        let document = Document {
            id: document_id,
            collection_id: collection.id.clone(),
            filename: request.filename,
            content_type: request.content_type,
            size_bytes: request
                .size_bytes
                .unwrap_or(request.text.len() as u64),
            chunk_count: chunks.len() as u64,
            embedded_chunk_count: embedded as u64,
            created_at: Utc::now(),
            metadata: request.metadata,
        };
        self.store.put_document(&document)?;
        self.store.put_chunks(&chunks)?;

        let points: Vec<VectorPoint> = chunks
            .iter()
            .filter_map(|c| {
                c.embedding.as_ref().map(|v| VectorPoint {
                    id: c.id.clone(),
                    vector: v.clone(),
                    payload: c.payload(),
                })
            })
            .collect();
        let index_mode = self.index.upsert(&collection.id, &points).await;

        collection.document_count += 1;
        collection.chunk_count += chunks.len() as u64;
        collection.updated_at = Utc::now();
        self.store.put_collection(&collection)?;

        if skipped > 0 {
            warn!(document_id = %document.id, skipped, "some chunks could not be embedded");
        }
        info!(
            document_id = %document.id,
            collection_id = %collection.id,
            chunks = chunks.len(),
            embedded,
            mode = ?index_mode,
            "document ingested"
        );

        Ok(IngestReport {
            chunks_created: chunks.len(),
            chunks_embedded: embedded,
            chunks_skipped: skipped,
            index_mode,
            document,
        })
    }

    pub fn get_document(&self, id: &str) -> Result<Document> {
        self.store
            .get_document(id)?
            .ok_or_else(|| Error::not_found("document", id))
    }

    pub fn list_documents(&self, collection_id: Option<&str>) -> Result<Vec<Document>> {
        if let Some(cid) = collection_id {
            self.get_collection(cid)?;
        }
        self.store.list_documents(collection_id)
    }

    pub fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        self.get_document(document_id)?;
        self.store.list_chunks(&ChunkFilter::document(document_id))
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let document = self.get_document(id)?;
        let mut collection = self.get_collection(&document.collection_id)?;
        self.remove_document(&document, &mut collection).await?;
        info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// Remove a document and its chunks, adjust the collection counters, and
    /// drop its points from the backend.
    async fn remove_document(&self, document: &Document, collection: &mut Collection) -> Result<()> {
        self.store.delete_document(&document.id)?;

        collection.document_count = collection.document_count.saturating_sub(1);
        collection.chunk_count = collection.chunk_count.saturating_sub(document.chunk_count);
        collection.updated_at = Utc::now();
        self.store.put_collection(collection)?;

        let point_ids: Vec<String> = (0..document.chunk_count)
            .map(|i| chunk_id(&document.id, i as u32))
            .collect();
        self.index.delete_points(&collection.id, &point_ids).await;
        Ok(())
    }

    // --- retrieval ---

    /// Embed `texts` with `model` (or the default model).
    ///
    /// Unavailable if any text could not be embedded.
    pub async fn embed(&self, texts: &[String], model: Option<&str>) -> Result<Availability<EmbedOutput>> {
        if texts.is_empty() {
            return Err(Error::validation("texts", "must not be empty"));
        }
        let model = model
            .unwrap_or(self.settings.default_embedding_model.as_str())
            .to_string();
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, result) in self.embedder.embed_many(texts, &model).await.into_iter().enumerate() {
            match result {
                Availability::Available(v) => embeddings.push(v),
                Availability::Unavailable(reason) => {
                    return Ok(Availability::Unavailable(format!("text {i}: {reason}")))
                }
            }
        }
        let dimension = embeddings.first().map_or(0, Vec::len);
        Ok(Availability::Available(EmbedOutput {
            model,
            embeddings,
            dimension,
        }))
    }

    /// Semantic search, scoped to one collection or across all of them.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        if request.limit == 0 {
            return Err(Error::validation("limit", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&request.score_threshold) {
            return Err(Error::validation(
                "score_threshold",
                format!("must be within [0, 1], got {}", request.score_threshold),
            ));
        }

        let model = match &request.collection_id {
            Some(cid) => self.get_collection(cid)?.embedding_model,
            None => self.settings.default_embedding_model.clone(),
        };

        let query = match self.embedder.embed(&request.query, &model).await {
            Availability::Available(v) => v,
            Availability::Unavailable(reason) => {
                warn!(%reason, "query embedding unavailable, returning no results");
                return Ok(SearchOutcome {
                    hits: Vec::new(),
                    mode: SearchMode::EmbeddingUnavailable,
                });
            }
        };

        let (points, mode) = match &request.collection_id {
            Some(cid) => {
                let found = self
                    .index
                    .search(cid, &query, request.limit, request.score_threshold)
                    .await?;
                (found.points, found.mode)
            }
            None => (
                self.index.scan(
                    &ChunkFilter::all_embedded(),
                    &query,
                    request.limit,
                    request.score_threshold,
                )?,
                SearchMode::Global,
            ),
        };

        debug!(hits = points.len(), mode = ?mode, "search complete");
        Ok(SearchOutcome {
            hits: points.into_iter().map(hit_from_point).collect(),
            mode,
        })
    }

    /// Search with the RAG score threshold and pack the hits into a
    /// token-budgeted context block.
    pub async fn rag_context(&self, request: &RagRequest) -> Result<RagContext> {
        let search = SearchRequest {
            query: request.query.clone(),
            collection_id: request.collection_id.clone(),
            limit: request.limit,
            score_threshold: self.settings.rag_score_threshold,
        };
        let outcome = self.search(&search).await?;

        let passages: Vec<Passage> = outcome
            .hits
            .iter()
            .map(|h| Passage::sourced(&h.filename, h.content.clone()))
            .collect();
        let assembled = context::assemble(&passages, request.max_tokens, request.include_sources);

        let mut sources = outcome.hits;
        sources.truncate(assembled.consumed);
        Ok(RagContext {
            query: request.query.clone(),
            total_tokens: assembled.estimated_tokens(),
            results_used: assembled.consumed,
            context: assembled.text,
            sources,
            mode: outcome.mode,
        })
    }

    pub fn stats(&self) -> Result<KnowledgeStats> {
        let collections = self.store.list_collections()?;
        let documents = self.store.list_documents(None)?;
        let mut per_collection = Vec::with_capacity(collections.len());
        for c in &collections {
            per_collection.push(CollectionStats {
                id: c.id.clone(),
                name: c.name.clone(),
                document_count: documents.iter().filter(|d| d.collection_id == c.id).count() as u64,
                chunk_count: self.store.count_chunks(Some(&c.id))?,
            });
        }
        Ok(KnowledgeStats {
            total_collections: collections.len(),
            total_documents: documents.len() as u64,
            total_chunks: self.store.count_chunks(None)?,
            collections: per_collection,
        })
    }
}

fn hit_from_point(point: ScoredPoint) -> SearchHit {
    let mut metadata = point.payload;
    let mut take = |key: &str| metadata.remove(key).map(|v| v.to_string()).unwrap_or_default();
    let content = take("content");
    let document_id = take("document_id");
    let collection_id = take("collection_id");
    let filename = metadata
        .get("filename")
        .map(|v| v.to_string())
        .unwrap_or_default();
    SearchHit {
        chunk_id: point.id,
        document_id,
        collection_id,
        filename,
        content,
        score: point.score,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic_uuids() {
        let a = chunk_id("doc_1", 0);
        assert_eq!(a, chunk_id("doc_1", 0));
        assert_ne!(a, chunk_id("doc_1", 1));
        assert_ne!(a, chunk_id("doc_2", 0));
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 5);
    }

    #[test]
    fn hit_extracts_payload_fields() {
        let mut payload = crate::types::Metadata::new();
        payload.insert("content".into(), "Gamma differs.".into());
        payload.insert("document_id".into(), "doc_1".into());
        payload.insert("collection_id".into(), "col_1".into());
        payload.insert("filename".into(), "greek.txt".into());
        payload.insert("chunk_index".into(), 1usize.into());

        let hit = hit_from_point(ScoredPoint {
            id: "k1".into(),
            score: 0.8,
            payload,
        });
        assert_eq!(hit.content, "Gamma differs.");
        assert_eq!(hit.filename, "greek.txt");
        assert_eq!(hit.document_id, "doc_1");
        assert!(!hit.metadata.contains_key("content"));
        assert_eq!(hit.metadata.get("chunk_index").and_then(|v| v.as_i64()), Some(1));
    }
}
