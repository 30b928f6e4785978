//! Top-k retrieval over an [`EmbeddingStore`].

use std::sync::Arc;

use crate::error::Result;
use crate::models::RetrievalResult;
use crate::store::EmbeddingStore;

/// Default k for conversational answering.
pub const CONVERSATION_K: usize = 3;
/// Default k for the `rag` search tool.
pub const TOOL_K: usize = 5;

/// Fixed-k similarity search. No score threshold, no re-ranking.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<EmbeddingStore>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<EmbeddingStore>, k: usize) -> Self {
        Self { store, k }
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.store.query(question, self.k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::testing::{seeded_store, KeywordEmbedder};

    #[tokio::test]
    async fn test_retrieve_caps_at_k() {
        let store = seeded_store(&[
            ("a.txt", "apples are red"),
            ("b.txt", "apples grow on trees"),
            ("c.txt", "apple pie recipe"),
            ("d.txt", "bananas are yellow"),
        ])
        .await;
        let hits = Retriever::new(store, 3).retrieve("apples").await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_store() {
        let store = Arc::new(EmbeddingStore::new(
            Arc::new(InMemoryStore::default()),
            Arc::new(KeywordEmbedder::default()),
        ));
        let hits = Retriever::new(store, CONVERSATION_K)
            .retrieve("anything")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
