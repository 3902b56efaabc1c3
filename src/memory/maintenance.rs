//! Consolidation: the lifecycle step that turns aged session memories into
//! episodic memories or discards them.
//!
//! ```text
//! session ──(age > max_age, importance ≥ threshold)──▶ episodic copy, original deleted
//!         ──(age > max_age, importance < threshold)──▶ deleted
//! ```
//!
//! A pass is not atomic across entries. Each candidate is promoted (if it
//! qualifies) before it is deleted, so an interrupted pass can leave an
//! original next to its episodic copy but never loses a qualifying memory.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::types::{MemoryEntry, MemoryFilter, MemoryKind};
use crate::error::{Error, Result};
use crate::storage::MemoryRepository;
use crate::summarizer::Summarizer;
use crate::types::{new_id, MetaValue};

/// Metadata key linking a promoted episodic entry to its origin.
pub const PROMOTED_FROM: &str = "promoted_from";

#[derive(Debug, Clone)]
pub struct ConsolidationRequest {
    /// Restrict the pass to one session.
    pub session_id: Option<String>,
    /// Session memories strictly older than this are candidates.
    pub max_age_hours: u32,
    pub importance_threshold: f64,
}

impl Default for ConsolidationRequest {
    fn default() -> Self {
        Self {
            session_id: None,
            max_age_hours: 24,
            importance_threshold: 0.3,
        }
    }
}

impl ConsolidationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.max_age_hours == 0 {
            return Err(Error::validation("max_age_hours", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.importance_threshold) {
            return Err(Error::validation(
                "importance_threshold",
                format!("must be within [0, 1], got {}", self.importance_threshold),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub candidates_found: usize,
    pub promoted: usize,
    /// Always equal to `candidates_found`: every candidate is removed.
    pub deleted: usize,
    pub promoted_ids: Vec<String>,
}

pub struct Consolidator {
    repo: Arc<dyn MemoryRepository>,
    summarizer: Arc<dyn Summarizer>,
    summary_model: String,
}

impl Consolidator {
    pub fn new(
        repo: Arc<dyn MemoryRepository>,
        summarizer: Arc<dyn Summarizer>,
        summary_model: String,
    ) -> Self {
        Self {
            repo,
            summarizer,
            summary_model,
        }
    }

    pub async fn consolidate(&self, request: &ConsolidationRequest) -> Result<ConsolidationReport> {
        request.validate()?;

        let cutoff = Utc::now() - Duration::hours(i64::from(request.max_age_hours));
        let candidates = self.repo.list_memories(&MemoryFilter {
            kinds: Some(vec![MemoryKind::Session]),
            session_id: request.session_id.clone(),
            before: Some(cutoff),
            ..MemoryFilter::default()
        })?;

        let mut report = ConsolidationReport {
            candidates_found: candidates.len(),
            ..ConsolidationReport::default()
        };

        for entry in candidates {
            if entry.importance.value() >= request.importance_threshold {
                let promoted = self.promote(&entry).await;
                self.repo.put_memory(&promoted)?;
                debug!(from = %entry.id, to = %promoted.id, "promoted session memory");
                report.promoted += 1;
                report.promoted_ids.push(promoted.id);
            }
            self.repo.delete_memory(&entry.id)?;
            report.deleted += 1;
        }

        info!(
            candidates = report.candidates_found,
            promoted = report.promoted,
            deleted = report.deleted,
            "consolidation finished"
        );
        Ok(report)
    }

    /// Build the episodic twin of `entry`. The summary is carried over, or
    /// requested from the summarizer when missing.
    async fn promote(&self, entry: &MemoryEntry) -> MemoryEntry {
        let summary = match &entry.summary {
            Some(s) => Some(s.clone()),
            None => self
                .summarizer
                .summarize(&entry.content, &self.summary_model)
                .await
                .ok(),
        };

        let mut metadata = entry.metadata.clone();
        metadata.insert(PROMOTED_FROM.into(), MetaValue::from(entry.id.as_str()));

        MemoryEntry {
            id: new_id("mem"),
            kind: MemoryKind::Episodic,
            content: entry.content.clone(),
            summary,
            importance: entry.importance,
            timestamp: entry.timestamp,
            session_id: entry.session_id.clone(),
            agent_id: entry.agent_id.clone(),
            metadata,
            embedding: entry.embedding.clone(),
        }
    }
}

impl super::MemoryStore {
    pub async fn consolidate(&self, request: &ConsolidationRequest) -> Result<ConsolidationReport> {
        self.consolidator().consolidate(request).await
    }
}
