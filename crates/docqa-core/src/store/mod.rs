//! Storage abstraction for embedded chunk records.
//!
//! The [`VectorStore`] trait is the persistence seam: it stores
//! [`EmbeddedRecord`]s keyed by id and answers nearest-neighbour queries over
//! pre-computed vectors. [`EmbeddingStore`] composes a backend with an
//! injected [`Embedder`] and is what the rest of the pipeline talks to.
//!
//! Backends in this workspace:
//!
//! | Backend | Crate |
//! |---------|-------|
//! | [`memory::InMemoryStore`] | `docqa-core` |
//! | `SqliteStore` | `docqa` |
//!
//! # Atomicity
//!
//! [`EmbeddingStore::add`] embeds every text before touching the backend.
//! If any embedding call fails nothing is written, and the backend applies
//! each [`VectorStore::upsert`] batch as one unit, so a concurrent query
//! sees either none or all of a batch.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkMetadata, EmbeddedRecord, RetrievalResult};

/// Similarity metric recorded in every collection's metadata.
///
/// Fixed at creation; backends refuse to open a collection recorded with a
/// different metric.
pub const METRIC: &str = "cosine";

/// Default number of texts sent to the embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Collection introspection, matching the `GET /collection` response.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub count: usize,
    pub name: String,
    pub metadata: serde_json::Value,
}

/// Abstract persistence backend for embedded records.
///
/// Implementations must be `Send + Sync` and must apply each `upsert` call
/// atomically with respect to `search`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Insert or overwrite records by id.
    ///
    /// When `replace_document` is set, every existing record whose document
    /// key equals it is removed in the same unit of work first.
    async fn upsert(&self, records: &[EmbeddedRecord], replace_document: Option<&str>)
        -> Result<()>;

    /// Cosine nearest-neighbour search, most similar first, at most `top_k`.
    async fn search(&self, query_vec: &[f32], top_k: usize) -> Result<RetrievalResult>;

    async fn count(&self) -> Result<usize>;

    /// Drop every record and the collection metadata. Idempotent.
    async fn delete_collection(&self) -> Result<()>;

    /// Collection-level metadata. Always carries the similarity metric under
    /// the `"metric"` key.
    async fn metadata(&self) -> Result<serde_json::Value>;
}

/// A vector collection bound to an embedding capability.
pub struct EmbeddingStore {
    backend: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl EmbeddingStore {
    pub fn new(backend: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            backend,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Embed and upsert parallel `ids`/`texts`/`metadatas`.
    ///
    /// All-or-nothing: returns [`RagError::Storage`] without writing if any
    /// embedding batch fails. Returns the number of records written.
    pub async fn add(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<usize> {
        let records = self.embed_records(ids, texts, metadatas).await?;
        self.backend.upsert(&records, None).await?;
        Ok(records.len())
    }

    /// Embed and upsert chunks produced by [`crate::chunk::chunk_document`].
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let (ids, texts, metadatas) = unzip_chunks(chunks);
        self.add(&ids, &texts, &metadatas).await
    }

    /// Like [`add_chunks`](Self::add_chunks), but first removes every record
    /// previously stored for `document` in the same backend transaction.
    pub async fn replace_document(&self, document: &str, chunks: &[Chunk]) -> Result<usize> {
        let (ids, texts, metadatas) = unzip_chunks(chunks);
        let records = self.embed_records(&ids, &texts, &metadatas).await?;
        self.backend.upsert(&records, Some(document)).await?;
        Ok(records.len())
    }

    /// Embed `query_text` and return up to `top_k` records, most similar first.
    ///
    /// An empty collection yields an empty result without calling the
    /// embedder.
    pub async fn query(&self, query_text: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 || self.backend.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query_text.to_string()])
            .await
            .map_err(|e| RagError::Storage(format!("query embedding failed: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Storage("empty embedding response".to_string()))?;

        self.backend.search(&query_vec, top_k).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.backend.count().await
    }

    pub async fn delete_collection(&self) -> Result<()> {
        self.backend.delete_collection().await
    }

    pub async fn info(&self) -> Result<CollectionInfo> {
        Ok(CollectionInfo {
            count: self.backend.count().await?,
            name: self.backend.name().to_string(),
            metadata: self.backend.metadata().await?,
        })
    }

    async fn embed_records(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<Vec<EmbeddedRecord>> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(RagError::Storage(format!(
                "mismatched batch: {} ids, {} texts, {} metadatas",
                ids.len(),
                texts.len(),
                metadatas.len()
            )));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .embedder
                .embed(batch)
                .await
                .map_err(|e| RagError::Storage(format!("embedding failed: {}", e)))?;
            if embedded.len() != batch.len() {
                return Err(RagError::Storage(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        debug!(
            model = self.embedder.model_name(),
            count = vectors.len(),
            "embedded batch"
        );

        Ok(ids
            .iter()
            .zip(texts)
            .zip(metadatas)
            .zip(vectors)
            .map(|(((id, text), metadata), embedding)| EmbeddedRecord {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
                embedding,
            })
            .collect())
    }
}

fn unzip_chunks(chunks: &[Chunk]) -> (Vec<String>, Vec<String>, Vec<ChunkMetadata>) {
    let ids = chunks.iter().map(|c| c.id.clone()).collect();
    let texts = chunks.iter().map(|c| c.text.clone()).collect();
    let metadatas = chunks.iter().map(|c| c.metadata.clone()).collect();
    (ids, texts, metadatas)
}

/// Sort hits by score (desc) then id (asc), and keep the first `top_k`.
pub fn rank(mut hits: RetrievalResult, top_k: usize) -> RetrievalResult {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(top_k);
    hits
}
