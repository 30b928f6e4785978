//! Core data models that flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};

/// Maximum characters of chunk content shown in a [`SourceRef`].
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Raw text produced by a loader, one per file or per PDF page.
///
/// Transient: consumed by chunking and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    /// File path or upload name the text came from.
    pub source: String,
    /// 0-based page number for paginated formats.
    pub page: Option<u32>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default)]
    pub page: u32,
    pub chunk_index: usize,
}

/// A bounded, overlapping segment of a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `"<basename>_chunk_<index>"`.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk plus its embedding, as persisted by a store backend.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl EmbeddedRecord {
    /// Key grouping all records of one ingested file (the source basename).
    pub fn document_key(&self) -> String {
        source_basename(&self.metadata.source)
    }
}

/// One hit of a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Ordered by score, most similar first. Empty is a valid result.
pub type RetrievalResult = Vec<ScoredChunk>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message. Used both for conversation history and as the
/// wire format handed to a [`crate::generate::Generator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A source shown next to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Chunk content, cut to [`SOURCE_PREVIEW_CHARS`] plus `...` when longer.
    pub content: String,
    pub file: String,
}

impl SourceRef {
    pub fn from_chunk(chunk: &ScoredChunk) -> Self {
        Self {
            content: preview(&chunk.content, SOURCE_PREVIEW_CHARS),
            file: chunk.metadata.source.clone(),
        }
    }
}

/// Synthesized answer with its attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    /// True when the text is a generation fallback rather than a model answer.
    pub fallback: bool,
}

/// Truncate to `max_chars` characters, appending `...` when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Final path component of a source, accepting both `/` and `\` separators.
pub fn source_basename(source: &str) -> String {
    source
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(source)
        .to_string()
}
