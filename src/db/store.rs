//! SQLite implementation of [`KnowledgeStore`] and [`MemoryRepository`].
//!
//! One connection behind a mutex. Every statement is short, so callers on the
//! async side hold the lock only for the duration of a single query.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::{decode_embedding, encode_embedding, HealthReport};
use crate::error::{Error, Result};
use crate::knowledge::types::{Chunk, Collection, Document};
use crate::memory::types::{Importance, MemoryEntry, MemoryFilter, MemoryKind, Session};
use crate::storage::{ChunkFilter, KnowledgeStore, MemoryRepository};
use crate::types::Metadata;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file with schema and migrations applied.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_database(path)?))
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_memory_database()?))
    }

    /// Wrap an already-initialized connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn health(&self) -> anyhow::Result<HealthReport> {
        let conn = self.conn()?;
        super::check_database_health(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }
}

// --- encoding helpers ---

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn metadata_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Metadata> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn embedding_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    let raw: Option<Vec<u8>> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(bytes) => decode_embedding(&bytes)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, Type::Blob, "embedding length is not a multiple of 4")),
    }
}

fn count_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

// --- row mappers ---

const COLLECTION_COLUMNS: &str =
    "id, name, description, embedding_model, document_count, chunk_count, created_at, updated_at";

fn row_to_collection(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        embedding_model: row.get(3)?,
        document_count: count_col(row, 4)?,
        chunk_count: count_col(row, 5)?,
        created_at: time_col(row, 6)?,
        updated_at: time_col(row, 7)?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, collection_id, filename, content_type, size_bytes, \
     chunk_count, embedded_chunk_count, created_at, metadata";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        filename: row.get(2)?,
        content_type: row.get(3)?,
        size_bytes: count_col(row, 4)?,
        chunk_count: count_col(row, 5)?,
        embedded_chunk_count: count_col(row, 6)?,
        created_at: time_col(row, 7)?,
        metadata: metadata_col(row, 8)?,
    })
}

const CHUNK_COLUMNS: &str = "id, document_id, collection_id, ordinal, content, embedding, metadata";

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let ordinal: i64 = row.get(3)?;
    Ok(Chunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        collection_id: row.get(2)?,
        ordinal: u32::try_from(ordinal).map_err(|e| conversion_error(3, Type::Integer, e))?,
        content: row.get(4)?,
        embedding: embedding_col(row, 5)?,
        metadata: metadata_col(row, 6)?,
    })
}

const MEMORY_COLUMNS: &str =
    "id, kind, content, summary, importance, timestamp, session_id, agent_id, metadata, embedding";

fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let kind: String = row.get(1)?;
    let importance: f64 = row.get(4)?;
    Ok(MemoryEntry {
        id: row.get(0)?,
        kind: kind
            .parse::<MemoryKind>()
            .map_err(|e| conversion_error(1, Type::Text, e))?,
        content: row.get(2)?,
        summary: row.get(3)?,
        importance: Importance::new(importance).map_err(|e| conversion_error(4, Type::Real, e))?,
        timestamp: time_col(row, 5)?,
        session_id: row.get(6)?,
        agent_id: row.get(7)?,
        metadata: metadata_col(row, 8)?,
        embedding: embedding_col(row, 9)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, agent_id, started_at, last_active_at, message_count, summary, metadata";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        started_at: time_col(row, 2)?,
        last_active_at: time_col(row, 3)?,
        message_count: count_col(row, 4)?,
        summary: row.get(5)?,
        metadata: metadata_col(row, 6)?,
    })
}

impl KnowledgeStore for SqliteStore {
    fn put_collection(&self, c: &Collection) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO collections (id, name, description, embedding_model, document_count,
                                      chunk_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                embedding_model = excluded.embedding_model,
                document_count = excluded.document_count,
                chunk_count = excluded.chunk_count,
                updated_at = excluded.updated_at",
            params![
                c.id,
                c.name,
                c.description,
                c.embedding_model,
                c.document_count as i64,
                c.chunk_count as i64,
                ts(&c.created_at),
                ts(&c.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn()?;
        let collection = conn
            .query_row(
                &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1"),
                [id],
                row_to_collection,
            )
            .optional()?;
        Ok(collection)
    }

    fn list_collections(&self) -> Result<Vec<Collection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map([], row_to_collection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn delete_collection(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM collections WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn put_document(&self, d: &Document) -> Result<()> {
        let conn = self.conn()?;
        let metadata = serde_json::to_string(&d.metadata)?;
        conn.execute(
            "INSERT INTO documents (id, collection_id, filename, content_type, size_bytes,
                                    chunk_count, embedded_chunk_count, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                chunk_count = excluded.chunk_count,
                embedded_chunk_count = excluded.embedded_chunk_count,
                metadata = excluded.metadata",
            params![
                d.id,
                d.collection_id,
                d.filename,
                d.content_type,
                d.size_bytes as i64,
                d.chunk_count as i64,
                d.embedded_chunk_count as i64,
                ts(&d.created_at),
                metadata,
            ],
        )?;
        Ok(())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let document = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                [id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    fn list_documents(&self, collection_id: Option<&str>) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let rows = match collection_id {
            Some(cid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection_id = ?1
                     ORDER BY created_at, id"
                ))?;
                let rows = stmt
                    .query_map([cid], row_to_document)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at, id"
                ))?;
                let rows = stmt
                    .query_map([], row_to_document)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn put_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO chunks ({CHUNK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.collection_id,
                    i64::from(chunk.ordinal),
                    chunk.content,
                    chunk.embedding.as_deref().map(encode_embedding),
                    serde_json::to_string(&chunk.metadata)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<Chunk>> {
        let mut sql = format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE 1 = 1");
        let mut args: Vec<&str> = Vec::new();
        if let Some(cid) = &filter.collection_id {
            args.push(cid);
            sql.push_str(&format!(" AND collection_id = ?{}", args.len()));
        }
        if let Some(did) = &filter.document_id {
            args.push(did);
            sql.push_str(&format!(" AND document_id = ?{}", args.len()));
        }
        if filter.embedded_only {
            sql.push_str(" AND embedding IS NOT NULL");
        }
        sql.push_str(" ORDER BY document_id, ordinal");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_chunk)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count_chunks(&self, collection_id: Option<&str>) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = match collection_id {
            Some(cid) => conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection_id = ?1",
                [cid],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?,
        };
        Ok(count.max(0) as u64)
    }
}

impl MemoryRepository for SqliteStore {
    fn put_memory(&self, m: &MemoryEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO memories ({MEMORY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                m.id,
                m.kind.as_str(),
                m.content,
                m.summary,
                m.importance.value(),
                ts(&m.timestamp),
                m.session_id,
                m.agent_id,
                serde_json::to_string(&m.metadata)?,
                m.embedding.as_deref().map(encode_embedding),
            ],
        )?;
        Ok(())
    }

    fn get_memory(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                [id],
                row_to_memory,
            )
            .optional()?;
        Ok(entry)
    }

    fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn list_memories(&self, filter: &MemoryFilter) -> Result<Vec<MemoryEntry>> {
        // SQL narrows on the indexed columns; `matches` applies the rest.
        let mut sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE 1 = 1");
        let mut args: Vec<&str> = Vec::new();
        if let Some(kinds) = &filter.kinds {
            if kinds.is_empty() {
                return Ok(Vec::new());
            }
            let start = args.len();
            args.extend(kinds.iter().map(|k| k.as_str()));
            let placeholders: Vec<String> =
                (start + 1..=args.len()).map(|i| format!("?{i}")).collect();
            sql.push_str(&format!(" AND kind IN ({})", placeholders.join(", ")));
        }
        if let Some(sid) = &filter.session_id {
            args.push(sid);
            sql.push_str(&format!(" AND session_id = ?{}", args.len()));
        }
        if let Some(aid) = &filter.agent_id {
            args.push(aid);
            sql.push_str(&format!(" AND agent_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY timestamp, id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().filter(|m| filter.matches(m)).collect())
    }

    fn put_session(&self, s: &Session) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO sessions ({SESSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                s.id,
                s.agent_id,
                ts(&s.started_at),
                ts(&s.last_active_at),
                s.message_count as i64,
                s.summary,
                serde_json::to_string(&s.metadata)?,
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                [id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn list_sessions(&self, agent_id: Option<&str>) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE (?1 IS NULL OR agent_id = ?1)
             ORDER BY last_active_at DESC, id"
        ))?;
        let rows = stmt
            .query_map([agent_id], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM memories WHERE session_id = ?1 AND kind = 'session'",
            [id],
        )?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(true)
    }
}
