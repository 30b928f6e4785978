//! SQLite-backed [`VectorStore`] implementation.
//!
//! One row per record in `records`, keyed by `(collection, id)`, with the
//! embedding stored as a little-endian f32 BLOB. Similarity search loads the
//! collection's vectors and ranks them in process with cosine similarity.
//!
//! Every upsert runs in a single transaction, so concurrent searches see
//! either none or all of a batch.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docqa_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docqa_core::error::{RagError, Result};
use docqa_core::models::{ChunkMetadata, EmbeddedRecord, RetrievalResult, ScoredChunk};
use docqa_core::store::{rank, VectorStore, METRIC};

/// SQLite implementation of the [`VectorStore`] trait for one collection.
pub struct SqliteStore {
    pool: SqlitePool,
    name: String,
}

impl SqliteStore {
    /// Open (creating if needed) the collection `name`.
    ///
    /// Fails with [`RagError::Storage`] if the collection exists with a
    /// metric other than [`METRIC`].
    pub async fn open(pool: SqlitePool, name: &str) -> Result<Self> {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT metric FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&pool)
                .await
                .map_err(RagError::storage)?;

        match existing {
            Some(metric) if metric != METRIC => {
                return Err(RagError::Storage(format!(
                    "collection '{}' uses metric '{}', expected '{}'",
                    name, metric, METRIC
                )));
            }
            Some(_) => {}
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO collections (name, metric, metadata_json, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(name)
                .bind(METRIC)
                .bind(default_metadata().to_string())
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&pool)
                .await
                .map_err(RagError::storage)?;
            }
        }

        Ok(Self {
            pool,
            name: name.to_string(),
        })
    }
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({ "metric": METRIC })
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(
        &self,
        records: &[EmbeddedRecord],
        replace_document: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        // Recreate the collection row if it was deleted since open.
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, metric, metadata_json, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&self.name)
        .bind(METRIC)
        .bind(default_metadata().to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(RagError::storage)?;

        if let Some(document) = replace_document {
            sqlx::query("DELETE FROM records WHERE collection = ? AND document = ?")
                .bind(&self.name)
                .bind(document)
                .execute(&mut *tx)
                .await
                .map_err(RagError::storage)?;
        }

        for record in records {
            let metadata_json =
                serde_json::to_string(&record.metadata).map_err(RagError::storage)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, document, text, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.name)
            .bind(&record.id)
            .bind(record.document_key())
            .bind(&record.text)
            .bind(metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        }

        tx.commit().await.map_err(RagError::storage)?;
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], top_k: usize) -> Result<RetrievalResult> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM records WHERE collection = ?",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).map_err(RagError::storage)?;
            hits.push(ScoredChunk {
                id: row.get("id"),
                content: row.get("text"),
                metadata,
                score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
            });
        }

        Ok(rank(hits, top_k))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(count as usize)
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        tx.commit().await.map_err(RagError::storage)?;
        Ok(())
    }

    async fn metadata(&self) -> Result<serde_json::Value> {
        let row = sqlx::query("SELECT metadata_json, created_at FROM collections WHERE name = ?")
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::storage)?;

        let Some(row) = row else {
            return Ok(default_metadata());
        };

        let metadata_json: String = row.get("metadata_json");
        let mut metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).unwrap_or_else(|_| default_metadata());
        if let Some(obj) = metadata.as_object_mut() {
            let created_at: String = row.get("created_at");
            obj.insert("created_at".to_string(), serde_json::Value::String(created_at));
        }
        Ok(metadata)
    }
}
