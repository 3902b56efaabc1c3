//! Session lifecycle: create, get, list, delete, and rolling summaries.

use chrono::{Duration, Utc};
use tracing::info;

use super::types::{MemoryFilter, Session, SessionQuery, SessionSummary};
use super::MemoryStore;
use crate::error::{Error, Result};
use crate::types::Metadata;

impl MemoryStore {
    pub fn create_session(&self, agent_id: Option<String>, metadata: Metadata) -> Result<Session> {
        let session = Session::new(agent_id, metadata);
        self.repo.put_session(&session)?;
        info!(session_id = %session.id, agent_id = ?session.agent_id, "session created");
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.repo
            .get_session(id)?
            .ok_or_else(|| Error::not_found("session", id))
    }

    /// Sessions matching the query, most recently active first.
    pub fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>> {
        let mut sessions = self.repo.list_sessions(query.agent_id.as_deref())?;
        if let Some(hours) = query.active_within_hours {
            let cutoff = Utc::now() - Duration::hours(i64::from(hours));
            sessions.retain(|s| s.last_active_at > cutoff);
        }
        sessions.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        if let Some(limit) = query.limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    /// Delete a session and its session-kind memories. Episodic and semantic
    /// memories from the session survive.
    pub fn delete_session(&self, id: &str) -> Result<()> {
        if !self.repo.delete_session(id)? {
            return Err(Error::not_found("session", id));
        }
        info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Summarize every memory tied to the session, oldest first, and store the
    /// result on the session. A summarizer outage leaves the summary unset.
    pub async fn summarize_session(&self, id: &str) -> Result<SessionSummary> {
        let mut session = self.get_session(id)?;
        let memories = self.repo.list_memories(&MemoryFilter {
            session_id: Some(id.to_string()),
            ..MemoryFilter::default()
        })?;

        if memories.is_empty() {
            return Ok(SessionSummary {
                session_id: session.id,
                summary: None,
                memories_summarized: 0,
            });
        }

        let combined = memories
            .iter()
            .map(|m| format!("[{}] {}", m.kind.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let summary = self
            .summarizer
            .summarize(&combined, &self.settings.summary_model)
            .await
            .ok();

        session.summary = summary.clone();
        self.repo.put_session(&session)?;

        Ok(SessionSummary {
            session_id: session.id,
            summary,
            memories_summarized: memories.len(),
        })
    }
}
