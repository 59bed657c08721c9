use crate::error::{SemanticSearchError, StorageError};
use crate::models::{Document, DocumentId, SearchHit, SimilarityQuery};
use crate::traits::{DocumentStore, VectorIndex};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why the resolver ended up on the keyword path.
#[derive(Debug)]
pub enum FallbackReason {
    BlankQuery,
    NoHits,
    NoResolvableIds,
    SemanticFailure(SemanticSearchError),
}

#[derive(Debug)]
pub enum SearchOutcome {
    Semantic(Vec<Document>),
    Fallback {
        reason: FallbackReason,
        documents: Vec<Document>,
    },
}

impl SearchOutcome {
    pub fn documents(&self) -> &[Document] {
        match self {
            SearchOutcome::Semantic(documents) => documents,
            SearchOutcome::Fallback { documents, .. } => documents,
        }
    }

    pub fn into_documents(self) -> Vec<Document> {
        match self {
            SearchOutcome::Semantic(documents) => documents,
            SearchOutcome::Fallback { documents, .. } => documents,
        }
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, SearchOutcome::Semantic(_))
    }
}

/// Semantic lookup first, substring match as the guaranteed baseline.
pub struct SearchResolver {
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
    options: SimilarityQuery,
}

impl SearchResolver {
    pub fn new(store: Arc<dyn DocumentStore>, index: Arc<dyn VectorIndex>) -> Self {
        Self::with_options(store, index, SimilarityQuery::default())
    }

    pub fn with_options(
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        options: SimilarityQuery,
    ) -> Self {
        Self {
            store,
            index,
            options,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Document>, StorageError> {
        Ok(self.resolve(query).await?.into_documents())
    }

    /// Only a failure of the keyword fallback itself is returned as an error.
    pub async fn resolve(&self, query: &str) -> Result<SearchOutcome, StorageError> {
        let reason = match self.semantic(query).await {
            Ok(documents) => {
                debug!(query, hits = documents.len(), "semantic search resolved");
                return Ok(SearchOutcome::Semantic(documents));
            }
            Err(reason) => reason,
        };

        match &reason {
            FallbackReason::SemanticFailure(error) => {
                warn!(query, error = %error, "semantic search failed, using keyword fallback");
            }
            other => debug!(query, reason = ?other, "using keyword fallback"),
        }

        let documents = self.store.search_like(query).await?;
        Ok(SearchOutcome::Fallback { reason, documents })
    }

    async fn semantic(&self, query: &str) -> Result<Vec<Document>, FallbackReason> {
        if query.trim().is_empty() {
            return Err(FallbackReason::BlankQuery);
        }

        let hits = match self.index.similarity_search(query, &self.options).await {
            Ok(hits) => hits,
            Err(error) => return Err(FallbackReason::SemanticFailure(error)),
        };

        if hits.is_empty() {
            return Err(FallbackReason::NoHits);
        }

        let ids = document_ids(&hits);
        if ids.is_empty() {
            return Err(FallbackReason::NoResolvableIds);
        }

        // Resolved ids are authoritative: documents deleted since indexing are
        // simply absent from the result.
        self.store
            .find_all_by_id(&ids)
            .await
            .map_err(|error| {
                FallbackReason::SemanticFailure(SemanticSearchError::Hydration(error))
            })
    }
}

/// Unique parent ids of the hits; hits without readable metadata are skipped.
pub fn document_ids(hits: &[SearchHit]) -> BTreeSet<DocumentId> {
    hits.iter()
        .filter_map(|hit| hit.metadata.map(|metadata| metadata.document_id))
        .collect()
}
