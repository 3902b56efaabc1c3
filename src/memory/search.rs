//! Memory recall: importance-weighted semantic ranking with a keyword fallback,
//! and prompt context built from the ranked results.
//!
//! Both rankings run on the same filtered candidate set. The keyword path is
//! taken only when the query itself cannot be embedded.

use chrono::Utc;
use tracing::{debug, warn};

use super::types::{
    MemoryContext, MemoryContextRequest, MemoryEntry, MemoryKind, MemoryQuery,
    MemorySearchOutcome, RankingMode, ScoredMemory,
};
use super::MemoryStore;
use crate::context::{self, Passage};
use crate::error::Result;
use crate::types::Availability;
use crate::vector::scan::cosine_similarity;

/// Share of the semantic score that does not depend on importance.
const SIMILARITY_BASE_WEIGHT: f64 = 0.7;
const IMPORTANCE_WEIGHT: f64 = 0.3;

/// Score = `cosine * (0.7 + 0.3 * importance)`. Entries without an embedding,
/// with a zero embedding, or with a different dimension are left out.
pub fn rank_semantic(candidates: Vec<MemoryEntry>, query: &[f32], limit: usize) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .filter_map(|entry| {
            let similarity = cosine_similarity(query, entry.embedding.as_deref()?)?;
            let weight = SIMILARITY_BASE_WEIGHT + IMPORTANCE_WEIGHT * entry.importance.value();
            Some(ScoredMemory {
                score: f64::from(similarity) * weight,
                entry,
            })
        })
        .collect();
    sort_and_truncate(&mut scored, limit);
    scored
}

/// Lowercase whitespace-separated tokens. Repeats are kept.
pub fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Score = number of query tokens found (as case-insensitive substrings) in
/// the content, times importance. A token repeated in the query counts once
/// per occurrence. Entries matching no token are left out.
pub fn rank_keyword(candidates: Vec<MemoryEntry>, query: &str, limit: usize) -> Vec<ScoredMemory> {
    let tokens = tokenize(query);
    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .filter_map(|entry| {
            let content = entry.content.to_lowercase();
            let matches = tokens.iter().filter(|t| content.contains(t.as_str())).count();
            (matches > 0).then(|| ScoredMemory {
                score: matches as f64 * entry.importance.value(),
                entry,
            })
        })
        .collect();
    sort_and_truncate(&mut scored, limit);
    scored
}

fn sort_and_truncate(scored: &mut Vec<ScoredMemory>, limit: usize) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
}

impl MemoryStore {
    /// Ranked recall over the entries matching the query's filters.
    pub async fn search(&self, query: &MemoryQuery) -> Result<MemorySearchOutcome> {
        query.validate()?;
        let candidates = self.repo.list_memories(&query.filter(Utc::now()))?;
        debug!(candidates = candidates.len(), "memory search candidates");

        let outcome = match self
            .embedder
            .embed(&query.query, &self.settings.embedding_model)
            .await
        {
            Availability::Available(vector) => MemorySearchOutcome {
                results: rank_semantic(candidates, &vector, query.limit),
                mode: RankingMode::Semantic,
            },
            Availability::Unavailable(reason) => {
                warn!(%reason, "query embedding unavailable, using keyword recall");
                MemorySearchOutcome {
                    results: rank_keyword(candidates, &query.query, query.limit),
                    mode: RankingMode::Keyword,
                }
            }
        };
        Ok(outcome)
    }

    /// Build a prompt-ready context block from the memories most relevant to
    /// `request.query`.
    ///
    /// Session memories are included only when a session is given. Each
    /// passage shows the summary when one exists, headed by its kind tag.
    pub async fn build_context(&self, request: &MemoryContextRequest) -> Result<MemoryContext> {
        let mut kinds = Vec::new();
        if request.session_id.is_some() {
            kinds.push(MemoryKind::Session);
        }
        if request.include_episodic {
            kinds.push(MemoryKind::Episodic);
        }
        if request.include_semantic {
            kinds.push(MemoryKind::Semantic);
        }
        if kinds.is_empty() {
            return Ok(MemoryContext {
                context: String::new(),
                memory_count: 0,
                total_tokens: 0,
                memory_ids: Vec::new(),
                mode: None,
            });
        }

        let query = MemoryQuery {
            query: request.query.clone(),
            kinds: Some(kinds),
            session_id: request.session_id.clone(),
            agent_id: request.agent_id.clone(),
            limit: self.settings.context_limit.max(1),
            min_importance: self.settings.context_min_importance,
            time_window_hours: None,
        };
        let outcome = self.search(&query).await?;

        let passages: Vec<Passage> = outcome
            .results
            .iter()
            .map(|r| Passage::tagged(r.entry.kind.as_str(), r.entry.display_text()))
            .collect();
        let assembled = context::assemble(&passages, request.max_tokens, true);

        Ok(MemoryContext {
            memory_ids: outcome.results[..assembled.consumed]
                .iter()
                .map(|r| r.entry.id.clone())
                .collect(),
            memory_count: assembled.consumed,
            total_tokens: assembled.estimated_tokens(),
            context: assembled.text,
            mode: Some(outcome.mode),
        })
    }
}
