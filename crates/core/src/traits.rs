use crate::error::{CorrectionError, IndexWriteError, SemanticSearchError, StorageError};
use crate::models::{Document, DocumentId, IndexEntry, NewDocument, SearchHit, SimilarityQuery};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Durable owner of documents. Implementations must never reuse an id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, document: NewDocument) -> Result<Document, StorageError>;

    async fn find_all_by_id(&self, ids: &BTreeSet<DocumentId>)
        -> Result<Vec<Document>, StorageError>;

    /// Case-insensitive substring match over text, description and filename.
    async fn search_like(&self, query: &str) -> Result<Vec<Document>, StorageError>;

    async fn find_all(&self) -> Result<Vec<Document>, StorageError>;

    async fn exists_by_id(&self, id: DocumentId) -> Result<bool, StorageError>;

    /// Returns `false` when no document had that id.
    async fn delete_by_id(&self, id: DocumentId) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Writes each entry independently. The result has one outcome per entry,
    /// in input order.
    async fn add(&self, entries: &[IndexEntry]) -> Vec<Result<(), IndexWriteError>>;

    async fn similarity_search(
        &self,
        query: &str,
        options: &SimilarityQuery,
    ) -> Result<Vec<SearchHit>, SemanticSearchError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CorrectionError>;
}
