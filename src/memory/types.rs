//! Core memory type definitions.
//!
//! Defines [`MemoryKind`] (session, episodic, semantic), the validated
//! [`Importance`] score, [`MemoryEntry`] and [`Session`] records, the shared
//! [`MemoryFilter`] predicate, and the request/response types of the memory API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{new_id, Metadata};

/// The three memory kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Volatile conversational context tied to one session. Subject to consolidation.
    Session,
    /// Events and learnings that outlive their session.
    Episodic,
    /// Facts and preferences.
    Semantic,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [Self::Session, Self::Episodic, Self::Semantic];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "session" => Ok(Self::Session),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// Importance score in `[0.0, 1.0]`. Out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Importance(f64);

impl Importance {
    pub const DEFAULT: Importance = Importance(0.5);

    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::validation(
                "importance",
                format!("must be within [0, 1], got {value}"),
            ))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Importance {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Importance> for f64 {
    fn from(value: Importance) -> Self {
        value.0
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub content: String,
    pub summary: Option<String>,
    pub importance: Importance,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryEntry {
    /// Summary when present, otherwise the full content.
    pub fn display_text(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.content)
    }
}

/// A conversation session. `last_active_at` never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: u64,
    pub summary: Option<String>,
    pub metadata: Metadata,
}

impl Session {
    pub fn new(agent_id: Option<String>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("session"),
            agent_id,
            started_at: now,
            last_active_at: now,
            message_count: 0,
            summary: None,
            metadata,
        }
    }

    /// Count one memory write at `at`.
    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        self.message_count += 1;
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }
}

/// The predicate shared by every memory query path.
///
/// Storage backends may narrow candidates by kind, session, and agent in their
/// native query language, but the final word is always [`MemoryFilter::matches`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    /// `None` means every kind.
    pub kinds: Option<Vec<MemoryKind>>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub min_importance: f64,
    /// Keep entries with `timestamp >= since`.
    pub since: Option<DateTime<Utc>>,
    /// Keep entries with `timestamp < before`.
    pub before: Option<DateTime<Utc>>,
}

impl MemoryFilter {
    pub fn kinds(kinds: impl IntoIterator<Item = MemoryKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&entry.kind) {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if entry.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        if let Some(agent_id) = &self.agent_id {
            if entry.agent_id.as_deref() != Some(agent_id.as_str()) {
                return false;
            }
        }
        if entry.importance.value() < self.min_importance {
            return false;
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(before) = self.before {
            if entry.timestamp >= before {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct StoreMemoryRequest {
    pub kind: MemoryKind,
    pub content: String,
    pub importance: f64,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Metadata,
    pub auto_summarize: bool,
}

impl StoreMemoryRequest {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            importance: Importance::DEFAULT.value(),
            session_id: None,
            agent_id: None,
            metadata: Metadata::new(),
            auto_summarize: false,
        }
    }

    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn auto_summarize(mut self, enabled: bool) -> Self {
        self.auto_summarize = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub query: String,
    pub kinds: Option<Vec<MemoryKind>>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub limit: usize,
    pub min_importance: f64,
    /// Only entries from the last `time_window_hours`.
    pub time_window_hours: Option<u32>,
}

impl MemoryQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kinds: None,
            session_id: None,
            agent_id: None,
            limit: 10,
            min_importance: 0.0,
            time_window_hours: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::validation("limit", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_importance) {
            return Err(Error::validation(
                "min_importance",
                format!("must be within [0, 1], got {}", self.min_importance),
            ));
        }
        Ok(())
    }

    pub fn filter(&self, now: DateTime<Utc>) -> MemoryFilter {
        MemoryFilter {
            kinds: self.kinds.clone(),
            session_id: self.session_id.clone(),
            agent_id: self.agent_id.clone(),
            min_importance: self.min_importance,
            since: self
                .time_window_hours
                .map(|h| now - Duration::hours(i64::from(h))),
            before: None,
        }
    }
}

/// Which ranking produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    Semantic,
    /// The query could not be embedded; substring matching was used instead.
    Keyword,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub entry: MemoryEntry,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySearchOutcome {
    pub results: Vec<ScoredMemory>,
    pub mode: RankingMode,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryContextRequest {
    pub query: String,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub include_episodic: bool,
    pub include_semantic: bool,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryContext {
    pub context: String,
    pub memory_count: usize,
    pub total_tokens: usize,
    pub memory_ids: Vec<String>,
    pub mode: Option<RankingMode>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub agent_id: Option<String>,
    pub active_within_hours: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub summary: Option<String>,
    pub memories_summarized: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub session_memories: usize,
    pub episodic_memories: usize,
    pub semantic_memories: usize,
    pub total_sessions: usize,
    pub active_sessions_24h: usize,
}
