#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use recollect::db::SqliteStore;
use recollect::embedding::EmbeddingProvider;
use recollect::knowledge::{KnowledgeBase, KnowledgeSettings};
use recollect::memory::types::{Importance, MemoryEntry, MemoryKind};
use recollect::memory::{MemorySettings, MemoryStore};
use recollect::summarizer::Summarizer;
use recollect::types::{new_id, Availability, Metadata};
use recollect::vector::scan::{cosine_similarity, finalize};
use recollect::vector::{ScoredPoint, VectorBackend, VectorPoint};

pub const DIM: usize = 64;

/// Fresh in-memory store with schema and migrations applied.
pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

/// Deterministic bag-of-words vector: every lowercase alphanumeric word adds
/// one to an FNV-1a bucket. Texts sharing words have positive similarity.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in word.to_lowercase().bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        v[(hash % DIM as u64) as usize] += 1.0;
    }
    v
}

/// Embeds with [`bag_of_words`]. Texts containing `fail_marker` are reported
/// unavailable.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub fail_marker: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl KeywordEmbedder {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn models_seen(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str, model: &str) -> Availability<Vec<f32>> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), model.to_string()));
        match &self.fail_marker {
            Some(marker) if text.contains(marker.as_str()) => Availability::unavailable("marker hit"),
            _ => Availability::Available(bag_of_words(text)),
        }
    }
}

/// An embedding service that is always down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str, _model: &str) -> Availability<Vec<f32>> {
        Availability::unavailable("connection refused")
    }
}

/// Returns a fixed summary, or is unavailable when `reply` is `None`.
pub struct CannedSummarizer {
    pub reply: Option<String>,
    pub inputs: Mutex<Vec<String>>,
}

impl CannedSummarizer {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn down() -> Self {
        Self {
            reply: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for CannedSummarizer {
    async fn summarize(&self, text: &str, _model: &str) -> Availability<String> {
        self.inputs.lock().unwrap().push(text.to_string());
        match &self.reply {
            Some(r) => Availability::Available(r.clone()),
            None => Availability::unavailable("summarizer down"),
        }
    }
}

/// A vector backend that never answers.
pub struct UnreachableBackend;

#[async_trait]
impl VectorBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }
    async fn ensure_collection(&self, _collection: &str, _dimension: usize) -> Availability<()> {
        Availability::unavailable("connection refused")
    }
    async fn upsert(&self, _collection: &str, _points: &[VectorPoint]) -> Availability<()> {
        Availability::unavailable("connection refused")
    }
    async fn search(
        &self,
        _collection: &str,
        _query: &[f32],
        _limit: usize,
        _score_threshold: f32,
    ) -> Availability<Vec<ScoredPoint>> {
        Availability::unavailable("connection refused")
    }
    async fn delete_points(&self, _collection: &str, _ids: &[String]) -> Availability<()> {
        Availability::unavailable("connection refused")
    }
    async fn delete_collection(&self, _collection: &str) -> Availability<()> {
        Availability::unavailable("connection refused")
    }
}

/// An in-process stand-in for a remote backend.
#[derive(Default)]
pub struct InMemoryBackend {
    pub collections: Mutex<HashMap<String, (usize, HashMap<String, VectorPoint>)>>,
}

impl InMemoryBackend {
    pub fn point_ids(&self, collection: &str) -> Vec<String> {
        let guard = self.collections.lock().unwrap();
        let mut ids: Vec<String> = guard
            .get(collection)
            .map(|(_, points)| points.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn dimension(&self, collection: &str) -> Option<usize> {
        self.collections.lock().unwrap().get(collection).map(|(d, _)| *d)
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Availability<()> {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_insert_with(|| (dimension, HashMap::new()));
        Availability::Available(())
    }
    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Availability<()> {
        let mut guard = self.collections.lock().unwrap();
        let Some((_, stored)) = guard.get_mut(collection) else {
            return Availability::unavailable("no such collection");
        };
        for p in points {
            stored.insert(p.id.clone(), p.clone());
        }
        Availability::Available(())
    }
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Availability<Vec<ScoredPoint>> {
        let guard = self.collections.lock().unwrap();
        let Some((_, stored)) = guard.get(collection) else {
            return Availability::Available(Vec::new());
        };
        let scored = stored
            .values()
            .filter_map(|p| cosine_similarity(query, &p.vector).map(|s| (p, s)))
            .collect();
        Availability::Available(
            finalize(scored, limit, score_threshold)
                .into_iter()
                .map(|(p, score)| ScoredPoint {
                    id: p.id.clone(),
                    score,
                    payload: p.payload.clone(),
                })
                .collect(),
        )
    }
    async fn delete_points(&self, collection: &str, ids: &[String]) -> Availability<()> {
        if let Some((_, stored)) = self.collections.lock().unwrap().get_mut(collection) {
            for id in ids {
                stored.remove(id);
            }
        }
        Availability::Available(())
    }
    async fn delete_collection(&self, collection: &str) -> Availability<()> {
        self.collections.lock().unwrap().remove(collection);
        Availability::Available(())
    }
}

pub fn knowledge_base(
    store: Arc<SqliteStore>,
    backend: Option<Arc<dyn VectorBackend>>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> KnowledgeBase {
    KnowledgeBase::new(store, backend, embedder, KnowledgeSettings::default())
}

pub fn memory_store(
    store: Arc<SqliteStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn Summarizer>,
) -> MemoryStore {
    MemoryStore::new(store, embedder, summarizer, MemorySettings::default())
}

/// A memory entry stamped `hours_ago` hours in the past, embedded with
/// [`bag_of_words`].
pub fn aged_memory(
    kind: MemoryKind,
    content: &str,
    importance: f64,
    hours_ago: i64,
    session_id: Option<&str>,
) -> MemoryEntry {
    MemoryEntry {
        id: new_id("mem"),
        kind,
        content: content.to_string(),
        summary: None,
        importance: Importance::new(importance).unwrap(),
        timestamp: Utc::now() - Duration::hours(hours_ago),
        session_id: session_id.map(str::to_string),
        agent_id: None,
        metadata: Metadata::new(),
        embedding: Some(bag_of_words(content)),
    }
}
