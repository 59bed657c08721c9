use crate::chunking::{build_chunks, ChunkingConfig};
use crate::error::{ConfigurationError, IndexWriteError, IngestError};
use crate::extractor::{TextExtractor, PDF_MEDIA_TYPE};
use crate::models::{Chunk, Document, IndexEntry, IngestionOptions, NewDocument, Upload};
use crate::traits::{DocumentStore, VectorIndex};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

pub const TEXT_MEDIA_TYPE: &str = "text/plain";

/// Recursively lists the regular files under `folder`, sorted by path.
pub fn discover_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

/// `.pdf` files are declared as PDFs, anything else as plain text.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        PDF_MEDIA_TYPE
    } else {
        TEXT_MEDIA_TYPE
    }
}

#[derive(Debug, Clone)]
pub struct FailedChunk {
    pub chunk_index: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document: Document,
    pub chunk_count: usize,
    pub failed_chunks: Vec<FailedChunk>,
}

impl IngestionReport {
    pub fn indexed_count(&self) -> usize {
        self.chunk_count - self.failed_chunks.len()
    }
}

/// Extract, persist, chunk, index. The document row is committed before any
/// chunk is written, and a failed chunk write never undoes it.
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        options: IngestionOptions,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            extractor,
            store,
            index,
            chunking: ChunkingConfig::try_from(options)?,
        })
    }

    pub async fn ingest(&self, upload: Upload) -> Result<Document, IngestError> {
        Ok(self.ingest_with_report(upload).await?.document)
    }

    pub async fn ingest_with_report(&self, upload: Upload) -> Result<IngestionReport, IngestError> {
        let text = self.extractor.extract(&upload.bytes, &upload.content_type)?;

        let document = self
            .store
            .save(NewDocument {
                filename: upload.filename,
                content_type: upload.content_type,
                content_text: text,
                description: upload.description,
                uploaded_at: Utc::now(),
            })
            .await?;

        let entries: Vec<IndexEntry> = build_chunks(document.id, &document.content_text, self.chunking)
            .into_iter()
            .map(Chunk::into_index_entry)
            .collect();

        let outcomes = if entries.is_empty() {
            Vec::new()
        } else {
            self.index.add(&entries).await
        };

        if outcomes.len() != entries.len() {
            warn!(
                document_id = %document.id,
                entries = entries.len(),
                outcomes = outcomes.len(),
                "index returned a mismatched outcome count"
            );
        }

        // Entries without an outcome count as failed writes.
        let mut outcomes = outcomes.into_iter();
        let mut failed_chunks = Vec::new();
        for entry in &entries {
            let outcome = outcomes
                .next()
                .unwrap_or(Err(IndexWriteError::MissingOutcome));
            if let Err(error) = outcome {
                warn!(
                    document_id = %document.id,
                    chunk_index = entry.metadata.chunk_index,
                    error = %error,
                    "chunk index write failed"
                );
                failed_chunks.push(FailedChunk {
                    chunk_index: entry.metadata.chunk_index,
                    reason: error.to_string(),
                });
            }
        }

        let report = IngestionReport {
            document,
            chunk_count: entries.len(),
            failed_chunks,
        };

        info!(
            document_id = %report.document.id,
            filename = report.document.filename.as_deref().unwrap_or_default(),
            chunk_count = report.chunk_count,
            indexed = report.indexed_count(),
            "document ingested"
        );

        Ok(report)
    }
}
