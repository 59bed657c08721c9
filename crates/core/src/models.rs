use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned by the [`DocumentStore`](crate::DocumentStore) on first persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub filename: Option<String>,
    pub content_type: String,
    pub content_text: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// A document that has not been through the store yet, so it has no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub filename: Option<String>,
    pub content_type: String,
    pub content_text: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl NewDocument {
    pub fn into_document(self, id: DocumentId) -> Document {
        Document {
            id,
            filename: self.filename,
            content_type: self.content_type,
            content_text: self.content_text,
            description: self.description,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Raw file as received from a client, before extraction.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: DocumentId,
    pub chunk_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: DocumentId,
    pub chunk_index: u32,
    pub text: String,
}

impl Chunk {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            document_id: self.document_id,
            chunk_index: self.chunk_index,
        }
    }

    pub fn into_index_entry(self) -> IndexEntry {
        IndexEntry {
            metadata: self.metadata(),
            text: self.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A similarity match. `metadata` is `None` when the stored payload did not
/// decode into a [`ChunkMetadata`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: Option<ChunkMetadata>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityQuery {
    pub top_k: usize,
    pub similarity_threshold: f32,
}

impl Default for SimilarityQuery {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 800,
            chunk_overlap_chars: 120,
        }
    }
}
