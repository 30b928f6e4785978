//! In-memory [`VectorStore`] implementation for tests and ephemeral runs.
//!
//! Records live in a `HashMap` behind a `std::sync::RwLock`. Each upsert
//! takes the write lock once, so readers observe whole batches. Vector
//! search is brute-force cosine similarity over every stored record.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{EmbeddedRecord, RetrievalResult, ScoredChunk};

use super::{rank, VectorStore, METRIC};

/// In-memory collection.
pub struct InMemoryStore {
    name: String,
    records: RwLock<HashMap<String, EmbeddedRecord>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new("documents")
    }
}

fn poisoned<T>(_: T) -> RagError {
    RagError::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(
        &self,
        records: &[EmbeddedRecord],
        replace_document: Option<&str>,
    ) -> Result<()> {
        let mut stored = self.records.write().map_err(poisoned)?;
        if let Some(doc) = replace_document {
            stored.retain(|_, r| r.document_key() != doc);
        }
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], top_k: usize) -> Result<RetrievalResult> {
        let stored = self.records.read().map_err(poisoned)?;
        let hits = stored
            .values()
            .map(|r| ScoredChunk {
                id: r.id.clone(),
                content: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(query_vec, &r.embedding),
            })
            .collect();
        Ok(rank(hits, top_k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.records.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn metadata(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "metric": METRIC, "backend": "memory" }))
    }
}
