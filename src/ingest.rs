//! Ingestion pipeline: load → chunk → embed → store.
//!
//! Files are processed sequentially. A failure in one file (unsupported
//! type, unreadable, malformed) is logged and recorded in the
//! [`IngestReport`]; the batch continues. Each file's chunks replace any
//! previously stored chunks of the same file name in one transaction, so
//! re-ingesting a file is idempotent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use docqa_core::chunk::{chunk_document, ChunkConfig};
use docqa_core::error::{RagError, Result};
use docqa_core::models::{source_basename, Chunk, Document};
use docqa_core::store::EmbeddingStore;

use crate::extract::{self, dotted_extension, FileFormat};

/// Load a file into one [`Document`] per page (PDF) or one per file.
pub fn load(path: &Path) -> Result<Vec<Document>> {
    let format = format_for(path)?;
    let bytes = std::fs::read(path).map_err(|e| RagError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    documents_from_bytes(path, &path.to_string_lossy(), &bytes, format)
}

/// Like [`load`], for an uploaded byte stream. `file_name` becomes the
/// documents' `source`.
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<Vec<Document>> {
    let path = Path::new(file_name);
    let format = format_for(path)?;
    documents_from_bytes(path, file_name, bytes, format)
}

fn format_for(path: &Path) -> Result<FileFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FileFormat::from_extension)
        .ok_or_else(|| RagError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: dotted_extension(path),
        })
}

fn documents_from_bytes(
    path: &Path,
    source: &str,
    bytes: &[u8],
    format: FileFormat,
) -> Result<Vec<Document>> {
    let pages = extract::extract_pages(bytes, format).map_err(|e| RagError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(match format {
        FileFormat::Pdf => pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document::new(text, source).with_page(i as u32))
            .collect(),
        _ => pages
            .into_iter()
            .map(|text| Document::new(text, source))
            .collect(),
    })
}

/// Chunk all documents of one file, numbering chunks across pages.
pub fn chunk_file(documents: &[Document], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        let next = chunk_document(doc, chunks.len(), config);
        chunks.extend(next);
    }
    chunks
}

/// Result of ingesting one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<usize>,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok())
            .sum()
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &RagError)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (f.path.as_path(), e)))
    }
}

/// Loads, chunks, and stores files into an [`EmbeddingStore`].
pub struct Ingestor {
    store: Arc<EmbeddingStore>,
    chunking: ChunkConfig,
}

impl Ingestor {
    pub fn new(store: Arc<EmbeddingStore>, chunking: ChunkConfig) -> Self {
        Self { store, chunking }
    }

    /// Ingest one file and return the number of chunks stored.
    pub async fn process_and_store(&self, path: &Path) -> Result<usize> {
        let documents = load(path)?;
        self.store_documents(&path.to_string_lossy(), &documents)
            .await
    }

    /// Ingest an uploaded file and return the number of chunks stored.
    pub async fn process_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<usize> {
        let documents = load_bytes(file_name, bytes)?;
        self.store_documents(file_name, &documents).await
    }

    async fn store_documents(&self, source: &str, documents: &[Document]) -> Result<usize> {
        let chunks = chunk_file(documents, &self.chunking);
        let stored = self
            .store
            .replace_document(&source_basename(source), &chunks)
            .await?;
        info!(
            source,
            pages = documents.len(),
            chunks = stored,
            "stored document"
        );
        Ok(stored)
    }

    /// Ingest `paths` one at a time; per-file failures do not stop the batch.
    pub async fn ingest_files(&self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();

        for path in paths {
            let result = self.process_and_store(path).await;
            if let Err(ref e) = result {
                warn!(path = %path.display(), code = e.code(), error = %e, "skipping file");
            }
            report.files.push(FileOutcome {
                path: path.clone(),
                result,
            });
        }

        info!(
            files = report.files.len(),
            succeeded = report.succeeded(),
            chunks = report.total_chunks(),
            "ingestion complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_txt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.TXT");
        fs::write(&path, "plain notes").unwrap();
        let docs = load(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "plain notes");
        assert_eq!(docs[0].page, None);
        assert!(docs[0].source.ends_with("notes.TXT"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_bytes("sheet.csv", b"a,b").unwrap_err();
        match err {
            RagError::UnsupportedFormat { extension, .. } => assert_eq!(extension, ".csv"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(
            load_bytes("Makefile", b"all:").unwrap_err(),
            RagError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::Load { .. }));
    }

    #[test]
    fn test_chunk_ids_continue_across_pages() {
        let docs = vec![
            Document::new("a".repeat(25), "/x/manual.pdf").with_page(0),
            Document::new("b".repeat(25), "/x/manual.pdf").with_page(1),
        ];
        let chunks = chunk_file(
            &docs,
            &ChunkConfig {
                chunk_size: 10,
                overlap: 0,
            },
        );
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "manual.pdf_chunk_0",
                "manual.pdf_chunk_1",
                "manual.pdf_chunk_2",
                "manual.pdf_chunk_3",
                "manual.pdf_chunk_4",
                "manual.pdf_chunk_5",
            ]
        );
        assert_eq!(chunks[3].metadata.page, 1);
    }
}
