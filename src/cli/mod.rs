pub mod doctor;
pub mod knowledge;
pub mod memory;
pub mod stats;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use recollect::config::RecollectConfig;
use recollect::db::SqliteStore;
use recollect::knowledge::{KnowledgeBase, KnowledgeSettings};
use recollect::memory::{MemorySettings, MemoryStore};
use recollect::{embedding, summarizer, vector};

/// Engines wired to the configured database and model services.
pub struct App {
    pub config: RecollectConfig,
    pub knowledge: KnowledgeBase,
    pub memory: MemoryStore,
}

impl App {
    pub fn from_config(config: &RecollectConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let store = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("failed to open database at {}", db_path.display()))?,
        );
        let embedder = embedding::create_provider(&config.ollama)?;
        let summarizer = summarizer::create_summarizer(&config.ollama)?;
        let backend = vector::create_backend(&config.vector)?;

        let knowledge = KnowledgeBase::new(
            Arc::clone(&store) as _,
            backend,
            Arc::clone(&embedder),
            KnowledgeSettings::from_config(config),
        );
        let memory = MemoryStore::new(store, embedder, summarizer, MemorySettings::from_config(config));

        Ok(Self {
            config: config.clone(),
            knowledge,
            memory,
        })
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `key=value` pairs into metadata. Values that parse as integers,
/// floats, or booleans keep that type.
pub fn parse_metadata(pairs: &[String]) -> Result<recollect::types::Metadata> {
    use recollect::types::MetaValue;

    let mut metadata = recollect::types::Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("metadata must be key=value, got {pair:?}"))?;
        let value = if let Ok(i) = value.parse::<i64>() {
            MetaValue::Int(i)
        } else if let Ok(f) = value.parse::<f64>() {
            MetaValue::Float(f)
        } else if let Ok(b) = value.parse::<bool>() {
            MetaValue::Bool(b)
        } else {
            MetaValue::from(value)
        };
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(metadata)
}
