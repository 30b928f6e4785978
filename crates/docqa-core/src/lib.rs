//! # docqa core
//!
//! Provider-agnostic logic for docqa: data models, chunking, the embedding
//! store abstraction, retrieval, conversation context, tool routing, and
//! answer synthesis.
//!
//! This crate contains no sqlx, filesystem I/O, or HTTP clients. Embedding
//! and generation are reached only through the [`embedding::Embedder`] and
//! [`generate::Generator`] traits; the `docqa` app crate supplies the
//! concrete providers and the SQLite store.
//!
//! ```text
//! files ─▶ chunk ─▶ EmbeddingStore ◀─ Retriever ◀─ Conversation ─▶ Synthesizer
//!                                        ▲
//!                          ToolRouter ───┘ (rag | duckduckgo | wikipedia)
//! ```

pub mod chunk;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod models;
pub mod retriever;
pub mod router;
pub mod store;
pub mod synth;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workflow;

pub use error::RagError;
