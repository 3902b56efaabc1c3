//! Document chunking.
//!
//! [`chunk_text`] splits raw text into bounded passages under a
//! [`ChunkingStrategy`]. All sizes are measured in characters (Unicode scalar
//! values), never bytes, so slicing never splits a code point.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest accepted `chunk_size`.
pub const MAX_CHUNK_SIZE: usize = 8192;

/// Sentence terminator followed by whitespace. The terminator stays with the
/// preceding sentence.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));

/// A blank line, tolerating trailing spaces and CRLF endings.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\r?\n").expect("valid paragraph regex"));

const SENTENCE_SEPARATOR: &str = " ";
const PARAGRAPH_SEPARATOR: &str = "\n\n";

// ── Strategy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMethod {
    Fixed,
    Sentence,
    #[default]
    Paragraph,
}

impl ChunkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
        }
    }

    /// Parse a method name. Unknown names fall back to paragraph mode.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Self::Fixed,
            "sentence" => Self::Sentence,
            "paragraph" => Self::Paragraph,
            other => {
                tracing::debug!(method = other, "unknown chunking method, using paragraph");
                Self::Paragraph
            }
        }
    }
}

impl fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunking configuration. Construct through [`ChunkingStrategy::new`] to get
/// validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingStrategy {
    pub method: ChunkMethod,
    /// Window size for `fixed`, maximum passage size for `sentence`/`paragraph`.
    pub chunk_size: usize,
    /// Back-step between fixed windows. Must be smaller than `chunk_size`.
    pub chunk_overlap: usize,
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self {
            method: ChunkMethod::Paragraph,
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingStrategy {
    pub fn new(method: ChunkMethod, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let strategy = Self {
            method,
            chunk_size,
            chunk_overlap,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Reject parameters that cannot make forward progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::validation(
                "chunk_size",
                format!("must be within [1, {MAX_CHUNK_SIZE}], got {}", self.chunk_size),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::validation(
                "chunk_overlap",
                format!(
                    "must be smaller than chunk_size ({}), got {}",
                    self.chunk_size, self.chunk_overlap
                ),
            ));
        }
        Ok(())
    }
}

// ── Chunking ──────────────────────────────────────────────────────────────────

/// Split `text` into ordered passages according to `strategy`.
///
/// Empty or whitespace-only input yields no passages.
pub fn chunk_text(text: &str, strategy: &ChunkingStrategy) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let size = strategy.chunk_size.max(1);
    let overlap = strategy.chunk_overlap;

    match strategy.method {
        ChunkMethod::Fixed => chunk_fixed(text, size, overlap),
        ChunkMethod::Sentence => pack(split_sentences(text), SENTENCE_SEPARATOR, size, None),
        ChunkMethod::Paragraph => pack(
            PARAGRAPH_BREAK.split(text),
            PARAGRAPH_SEPARATOR,
            size,
            Some(overlap),
        ),
    }
}

/// Fixed-size character windows stepping by `size - overlap`.
///
/// The step is coerced to at least one character, so even unvalidated
/// parameters terminate. The window that reaches the end of the text is the
/// last one.
fn chunk_fixed(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == total {
            break;
        }
        start += step;
    }
    chunks
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // Terminators are single-byte ASCII.
        pieces.push(&text[last..m.start() + 1]);
        last = m.end();
    }
    pieces.push(&text[last..]);
    pieces.into_iter()
}

/// Greedily pack units into passages.
///
/// A unit joins the running passage only while the joined length, separator
/// included, stays below `max_size`; otherwise the passage is closed and the
/// unit starts the next one. When `split_oversized` carries an overlap, a
/// unit longer than `max_size` is split with [`chunk_fixed`] and its pieces
/// are emitted directly, bypassing the running passage. Without it, oversized
/// units are kept whole.
fn pack<'a>(
    units: impl Iterator<Item = &'a str>,
    separator: &str,
    max_size: usize,
    split_oversized: Option<usize>,
) -> Vec<String> {
    let separator_len = separator.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for unit in units {
        let unit = unit.trim();
        if unit.is_empty() {
            continue;
        }
        let unit_len = unit.chars().count();

        if !current.is_empty() && current_len + separator_len + unit_len < max_size {
            current.push_str(separator);
            current.push_str(unit);
            current_len += separator_len + unit_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        match split_oversized {
            Some(overlap) if unit_len > max_size => {
                chunks.extend(chunk_fixed(unit, max_size, overlap));
            }
            _ => {
                current.push_str(unit);
                current_len = unit_len;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
