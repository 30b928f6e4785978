//! Deterministic in-process doubles for the pipeline's capabilities.
//!
//! Used by unit tests here and by the app crate's integration tests; none of
//! them touch the network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::chunk::{chunk_document, ChunkConfig};
use crate::embedding::Embedder;
use crate::generate::{GenerateOptions, Generator};
use crate::models::{Document, Turn};
use crate::router::SearchTool;
use crate::store::memory::InMemoryStore;
use crate::store::EmbeddingStore;

/// Bag-of-words embedder: each lowercase alphanumeric token is hashed
/// (FNV-1a) into one of `dims` buckets. Texts sharing words score higher.
pub struct KeywordEmbedder {
    dims: usize,
}

impl KeywordEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding backend unavailable"))
    }
}

/// Generator that returns a fixed reply and records every call.
pub struct RecordingGenerator {
    reply: String,
    calls: Mutex<Vec<(Vec<Turn>, GenerateOptions)>>,
}

impl RecordingGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Messages of each call, in call order.
    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn options(&self) -> Vec<GenerateOptions> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| o.clone())
            .collect()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, messages: &[Turn], opts: &GenerateOptions) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((messages.to_vec(), opts.clone()));
        Ok(self.reply.clone())
    }
}

pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _messages: &[Turn], _opts: &GenerateOptions) -> Result<String> {
        Err(anyhow!("{}", self.message))
    }
}

/// Generator that sleeps before answering.
pub struct SlowGenerator {
    delay: Duration,
}

impl SlowGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Generator for SlowGenerator {
    fn model_name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _messages: &[Turn], _opts: &GenerateOptions) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("late".to_string())
    }
}

/// Tool returning a fixed result.
pub struct StaticTool {
    name: String,
    label: String,
    output: String,
}

impl StaticTool {
    pub fn new(name: &str, label: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl SearchTool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, _query: &str) -> Result<String> {
        Ok(self.output.clone())
    }
}

pub struct FailingTool {
    name: String,
    label: String,
}

impl FailingTool {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl SearchTool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, _query: &str) -> Result<String> {
        Err(anyhow!("connection refused"))
    }
}

pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl SearchTool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        "Slow"
    }

    async fn invoke(&self, _query: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("late".to_string())
    }
}

/// In-memory store with one document per `(source, text)` pair, chunked
/// with the default configuration and embedded by [`KeywordEmbedder`].
pub async fn seeded_store(docs: &[(&str, &str)]) -> Arc<EmbeddingStore> {
    let store = EmbeddingStore::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(KeywordEmbedder::default()),
    );
    for (source, text) in docs {
        let chunks = chunk_document(&Document::new(*text, *source), 0, &ChunkConfig::default());
        // KeywordEmbedder cannot fail.
        let _ = store.add_chunks(&chunks).await;
    }
    Arc::new(store)
}
