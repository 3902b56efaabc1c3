//! Knowledge-base records and request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunking::ChunkingStrategy;
use crate::types::{MetaValue, Metadata};

/// A named group of documents sharing one embedding model and one index namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub embedding_model: String,
    pub document_count: u64,
    pub chunk_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub chunk_count: u64,
    /// Chunks that received an embedding. Diverges from `chunk_count` after a
    /// partial ingestion.
    pub embedded_chunk_count: u64,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Document {
    pub fn is_partially_embedded(&self) -> bool {
        self.embedded_chunk_count < self.chunk_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub collection_id: String,
    pub ordinal: u32,
    pub content: String,
    /// `None` when the embedding provider was unavailable at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
}

impl Chunk {
    /// Payload stored alongside the vector: chunk metadata plus the text and
    /// owning ids, so a search hit can be rendered without a store lookup.
    pub fn payload(&self) -> Metadata {
        let mut payload = self.metadata.clone();
        payload.insert("content".into(), MetaValue::from(self.content.as_str()));
        payload.insert("document_id".into(), MetaValue::from(self.document_id.as_str()));
        payload.insert("collection_id".into(), MetaValue::from(self.collection_id.as_str()));
        payload.insert("chunk_index".into(), MetaValue::Int(i64::from(self.ordinal)));
        payload
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Falls back to the configured default model when absent.
    #[serde(default)]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub collection_id: String,
    pub filename: String,
    pub content_type: String,
    pub text: String,
    /// Byte size of the original upload. Defaults to the text length.
    pub size_bytes: Option<u64>,
    pub strategy: Option<ChunkingStrategy>,
    /// Re-ingesting under an existing id replaces that document.
    pub document_id: Option<String>,
    pub metadata: Metadata,
}

impl IngestRequest {
    pub fn new(collection_id: impl Into<String>, filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            filename: filename.into(),
            content_type: "text/plain".into(),
            text: text.into(),
            size_bytes: None,
            strategy: None,
            document_id: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }
}

/// How a search or index write was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// The remote vector backend answered.
    Remote,
    /// The backend was unreachable or disabled; stored vectors were scanned in process.
    Fallback,
    /// No collection given; every stored chunk was scanned.
    Global,
    /// The query could not be embedded, so nothing was searched.
    EmbeddingUnavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: Document,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_skipped: usize,
    pub index_mode: SearchMode,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub collection_id: Option<String>,
    pub limit: usize,
    pub score_threshold: f32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection_id: None,
            limit: 5,
            score_threshold: 0.0,
        }
    }

    pub fn in_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub collection_id: String,
    pub filename: String,
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub mode: SearchMode,
}

#[derive(Debug, Clone)]
pub struct RagRequest {
    pub query: String,
    pub collection_id: Option<String>,
    pub limit: usize,
    pub max_tokens: usize,
    pub include_sources: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagContext {
    pub query: String,
    pub context: String,
    pub results_used: usize,
    pub total_tokens: usize,
    pub sources: Vec<SearchHit>,
    pub mode: SearchMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedOutput {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub id: String,
    pub name: String,
    pub document_count: u64,
    pub chunk_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub total_collections: usize,
    pub total_documents: u64,
    pub total_chunks: u64,
    pub collections: Vec<CollectionStats>,
}
