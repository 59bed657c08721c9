//! In-process adapters for tests and single-node runs without external services.
//!
//! Documents live in a `BTreeMap` keyed by id, so listings come back in
//! insertion order. Vector search is brute-force cosine similarity over every
//! stored embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{IndexWriteError, SemanticSearchError, StorageError};
use crate::models::{Document, DocumentId, IndexEntry, NewDocument, SearchHit, SimilarityQuery};
use crate::traits::{DocumentStore, VectorIndex};

#[derive(Default)]
struct DocumentTable {
    rows: BTreeMap<DocumentId, Document>,
    last_id: i64,
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    table: RwLock<DocumentTable>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_like(document: &Document, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);
    contains(document.content_text.as_str())
        || document.description.as_deref().is_some_and(contains)
        || document.filename.as_deref().is_some_and(contains)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, document: NewDocument) -> Result<Document, StorageError> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let saved = document.into_document(DocumentId(table.last_id));
        table.rows.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_all_by_id(
        &self,
        ids: &BTreeSet<DocumentId>,
    ) -> Result<Vec<Document>, StorageError> {
        let table = self.table.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }

    async fn search_like(&self, query: &str) -> Result<Vec<Document>, StorageError> {
        let needle = query.to_lowercase();
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|document| matches_like(document, &needle))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Document>, StorageError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn exists_by_id(&self, id: DocumentId) -> Result<bool, StorageError> {
        Ok(self.table.read().await.rows.contains_key(&id))
    }

    async fn delete_by_id(&self, id: DocumentId) -> Result<bool, StorageError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

struct StoredVector {
    entry: IndexEntry,
    vector: Vec<f32>,
}

pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.vectors.read().await.len()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, entries: &[IndexEntry]) -> Vec<Result<(), IndexWriteError>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = match self.embedder.embed(&entry.text).await {
                Ok(vector) => {
                    self.vectors.write().await.push(StoredVector {
                        entry: entry.clone(),
                        vector,
                    });
                    Ok(())
                }
                Err(error) => Err(IndexWriteError::from(error)),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn similarity_search(
        &self,
        query: &str,
        options: &SimilarityQuery,
    ) -> Result<Vec<SearchHit>, SemanticSearchError> {
        let query_vector = self.embedder.embed(query).await?;
        let vectors = self.vectors.read().await;

        let mut hits: Vec<SearchHit> = vectors
            .iter()
            .map(|stored| SearchHit {
                text: stored.entry.text.clone(),
                metadata: Some(stored.entry.metadata),
                score: cosine_similarity(&query_vector, &stored.vector),
            })
            .filter(|hit| hit.score >= options.similarity_threshold)
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(options.top_k);
        Ok(hits)
    }
}
