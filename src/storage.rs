//! Storage abstractions for the knowledge base and the memory subsystem.
//!
//! Engines receive these as `Arc<dyn ...>` at construction. The SQLite
//! implementation lives in [`crate::db::SqliteStore`].

use crate::error::Result;
use crate::knowledge::types::{Chunk, Collection, Document};
use crate::memory::types::{MemoryEntry, MemoryFilter, Session};

/// Narrows [`KnowledgeStore::list_chunks`].
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub collection_id: Option<String>,
    pub document_id: Option<String>,
    /// Skip chunks whose embedding failed at ingestion.
    pub embedded_only: bool,
}

impl ChunkFilter {
    pub fn embedded_in(collection_id: &str) -> Self {
        Self {
            collection_id: Some(collection_id.to_string()),
            document_id: None,
            embedded_only: true,
        }
    }

    pub fn all_embedded() -> Self {
        Self {
            embedded_only: true,
            ..Self::default()
        }
    }

    pub fn document(document_id: &str) -> Self {
        Self {
            document_id: Some(document_id.to_string()),
            ..Self::default()
        }
    }
}

pub trait KnowledgeStore: Send + Sync {
    /// Insert or update. Updating never touches the collection's documents.
    fn put_collection(&self, collection: &Collection) -> Result<()>;
    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;
    fn list_collections(&self) -> Result<Vec<Collection>>;
    /// Removes the collection with its documents and chunks. `false` if absent.
    fn delete_collection(&self, id: &str) -> Result<bool>;

    fn put_document(&self, document: &Document) -> Result<()>;
    fn get_document(&self, id: &str) -> Result<Option<Document>>;
    fn list_documents(&self, collection_id: Option<&str>) -> Result<Vec<Document>>;
    /// Removes the document and its chunks. `false` if absent.
    fn delete_document(&self, id: &str) -> Result<bool>;

    /// Insert or replace all chunks atomically.
    fn put_chunks(&self, chunks: &[Chunk]) -> Result<()>;
    /// Chunks ordered by document then ordinal.
    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<Chunk>>;
    fn count_chunks(&self, collection_id: Option<&str>) -> Result<u64>;
}

pub trait MemoryRepository: Send + Sync {
    fn put_memory(&self, entry: &MemoryEntry) -> Result<()>;
    fn get_memory(&self, id: &str) -> Result<Option<MemoryEntry>>;
    fn delete_memory(&self, id: &str) -> Result<bool>;
    /// Every entry for which `filter.matches` holds, oldest first.
    fn list_memories(&self, filter: &MemoryFilter) -> Result<Vec<MemoryEntry>>;

    fn put_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn list_sessions(&self, agent_id: Option<&str>) -> Result<Vec<Session>>;
    /// Removes the session together with its session-kind entries. Episodic
    /// and semantic entries keep their `session_id`.
    fn delete_session(&self, id: &str) -> Result<bool>;
}
