//! Write path: embedding, optional summarization, storage, and session
//! bookkeeping. Also single-entry reads, deletes, and importance updates.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::types::{Importance, MemoryEntry, StoreMemoryRequest};
use super::MemoryStore;
use crate::error::{Error, Result};
use crate::types::{new_id, Availability};

impl MemoryStore {
    /// Store a memory entry.
    ///
    /// The embedding is best-effort; an entry stored without one is still
    /// reachable through keyword recall. With `auto_summarize`, content longer
    /// than the configured threshold also gets a summary when the summarizer
    /// answers. A write tied to an existing session counts as activity on it.
    pub async fn store(&self, request: StoreMemoryRequest) -> Result<MemoryEntry> {
        let importance = Importance::new(request.importance)?;
        if request.content.trim().is_empty() {
            return Err(Error::validation("content", "must not be empty"));
        }

        let embedding = match self
            .embedder
            .embed(&request.content, &self.settings.embedding_model)
            .await
        {
            Availability::Available(v) => Some(v),
            Availability::Unavailable(reason) => {
                warn!(%reason, "storing memory without embedding");
                None
            }
        };

        let summary = if request.auto_summarize
            && request.content.chars().count() > self.settings.summarize_threshold_chars
        {
            self.summarizer
                .summarize(&request.content, &self.settings.summary_model)
                .await
                .ok()
        } else {
            None
        };

        let entry = MemoryEntry {
            id: new_id("mem"),
            kind: request.kind,
            content: request.content,
            summary,
            importance,
            timestamp: Utc::now(),
            session_id: request.session_id,
            agent_id: request.agent_id,
            metadata: request.metadata,
            embedding,
        };
        self.repo.put_memory(&entry)?;

        if let Some(session_id) = &entry.session_id {
            match self.repo.get_session(session_id)? {
                Some(mut session) => {
                    session.record_activity(entry.timestamp);
                    self.repo.put_session(&session)?;
                }
                None => debug!(session_id = %session_id, "memory references an unknown session"),
            }
        }

        info!(
            memory_id = %entry.id,
            kind = %entry.kind,
            importance = entry.importance.value(),
            embedded = entry.embedding.is_some(),
            "memory stored"
        );
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Result<MemoryEntry> {
        self.repo
            .get_memory(id)?
            .ok_or_else(|| Error::not_found("memory", id))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.repo.delete_memory(id)? {
            return Err(Error::not_found("memory", id));
        }
        debug!(memory_id = %id, "memory deleted");
        Ok(())
    }

    /// Replace an entry's importance. Out-of-range values are rejected before
    /// the entry is looked up.
    pub fn update_importance(&self, id: &str, importance: f64) -> Result<MemoryEntry> {
        let importance = Importance::new(importance)?;
        let mut entry = self.get(id)?;
        entry.importance = importance;
        self.repo.put_memory(&entry)?;
        Ok(entry)
    }
}
