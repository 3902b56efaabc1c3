use chrono::{Duration, Utc};

use super::types::{MemoryFilter, MemoryKind, MemoryStats};
use super::MemoryStore;
use crate::error::Result;

impl MemoryStore {
    /// Entry counts by kind plus session totals. "Active" means touched in the
    /// last 24 hours.
    pub fn stats(&self) -> Result<MemoryStats> {
        let memories = self.repo.list_memories(&MemoryFilter::default())?;
        let count = |kind: MemoryKind| memories.iter().filter(|m| m.kind == kind).count();

        let sessions = self.repo.list_sessions(None)?;
        let cutoff = Utc::now() - Duration::hours(24);

        Ok(MemoryStats {
            total_memories: memories.len(),
            session_memories: count(MemoryKind::Session),
            episodic_memories: count(MemoryKind::Episodic),
            semantic_memories: count(MemoryKind::Semantic),
            total_sessions: sessions.len(),
            active_sessions_24h: sessions.iter().filter(|s| s.last_active_at > cutoff).count(),
        })
    }
}
