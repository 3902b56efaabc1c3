//! Library error taxonomy.
//!
//! Collaborator failures (embedding, vector backend, summarizer) never appear
//! here: they are reported through [`crate::types::Availability`] and degrade
//! to documented fallbacks. What remains are caller mistakes ([`Error::NotFound`],
//! [`Error::Validation`]) and local storage faults.

/// Errors surfaced by the retrieval and memory engines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The referenced collection, document, memory, or session does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Input rejected before any side effect took place.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// `true` for errors caused by the caller's request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
