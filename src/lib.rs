//! Retrieval and memory for LLM applications.
//!
//! Recollect keeps two kinds of long-lived state for a language-model client:
//!
//! | Subsystem | Holds | Recall |
//! |-----------|-------|--------|
//! | **Knowledge** | Collections of ingested documents, split into chunks | Cosine similarity over chunk embeddings |
//! | **Memory** | Session, episodic, and semantic entries with an importance score | Importance-weighted similarity, keyword fallback |
//!
//! Both feed the same context assembler, which packs ranked passages into a
//! token budget for a prompt.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) for every record, including chunk and memory embeddings
//! - **Vectors**: Qdrant over REST when reachable, otherwise an in-process scan of stored embeddings
//! - **Models**: Ollama for embeddings and summaries; outages degrade results instead of failing writes
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: SQLite schema, migrations, health checks, and the [`SqliteStore`](db::SqliteStore)
//! - [`storage`]: persistence traits the engines are written against
//! - [`chunking`]: fixed, sentence, and paragraph chunking
//! - [`embedding`] / [`summarizer`]: model collaborators
//! - [`vector`]: remote vector backend, local scan, and the fallback-aware index
//! - [`knowledge`]: collections, ingestion, search, and RAG context
//! - [`memory`]: memory entries, sessions, recall, and consolidation
//! - [`context`]: token-budgeted context assembly

pub mod chunking;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod memory;
pub mod storage;
pub mod summarizer;
pub mod types;
pub mod vector;

pub use error::{Error, Result};
