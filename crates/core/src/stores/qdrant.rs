use crate::embeddings::Embedder;
use crate::error::{IndexWriteError, SemanticSearchError};
use crate::models::{ChunkMetadata, IndexEntry, SearchHit, SimilarityQuery};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    embedder: Arc<dyn Embedder>,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::builder().timeout(timeout).build()?,
            embedder,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), IndexWriteError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(IndexWriteError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": self.embedder.dimensions(),
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexWriteError::BackendResponse {
                backend: "qdrant".to_string(),
                details: format!("collection setup failed with {}", response.status()),
            });
        }

        debug!(collection = %self.collection, "created qdrant collection");
        Ok(())
    }

    async fn upsert_point(&self, entry: &IndexEntry) -> Result<(), IndexWriteError> {
        let embedding = self.embedder.embed(&entry.text).await?;
        let payload = point_payload(entry)?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({
                "points": [{
                    "id": Uuid::new_v4().to_string(),
                    "vector": embedding,
                    "payload": payload,
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexWriteError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

fn point_payload(entry: &IndexEntry) -> Result<Value, serde_json::Error> {
    let mut payload = serde_json::to_value(entry.metadata)?;
    if let Value::Object(fields) = &mut payload {
        fields.insert("text".to_string(), Value::String(entry.text.clone()));
    }
    Ok(payload)
}

fn parse_search_response(parsed: &Value) -> Result<Vec<SearchHit>, SemanticSearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| SemanticSearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "missing result array".to_string(),
        })?;

    Ok(hits
        .iter()
        .map(|hit| {
            let payload = hit.pointer("/payload");
            SearchHit {
                text: payload
                    .and_then(|payload| payload.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                metadata: payload
                    .cloned()
                    .and_then(|payload| serde_json::from_value::<ChunkMetadata>(payload).ok()),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            }
        })
        .collect())
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn add(&self, entries: &[IndexEntry]) -> Vec<Result<(), IndexWriteError>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.upsert_point(entry).await);
        }
        outcomes
    }

    async fn similarity_search(
        &self,
        query: &str,
        options: &SimilarityQuery,
    ) -> Result<Vec<SearchHit>, SemanticSearchError> {
        let query_vector = self.embedder.embed(query).await?;

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": options.top_k,
                "score_threshold": options.similarity_threshold,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SemanticSearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_search_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentId;

    #[test]
    fn payload_carries_metadata_and_text() {
        let entry = IndexEntry {
            text: "chunk body".to_string(),
            metadata: ChunkMetadata {
                document_id: DocumentId(5),
                chunk_index: 2,
            },
        };

        let payload = point_payload(&entry).unwrap();
        assert_eq!(
            payload,
            json!({ "documentId": 5, "chunkIndex": 2, "text": "chunk body" })
        );
    }

    #[test]
    fn search_response_keeps_hits_with_unreadable_payloads() {
        let response = json!({
            "result": [
                { "id": "a", "score": 0.91, "payload": { "documentId": 5, "chunkIndex": 0, "text": "hello" } },
                { "id": "b", "score": 0.75, "payload": { "documentId": "five", "chunkIndex": 1 } },
                { "id": "c", "score": 0.60 }
            ]
        });

        let hits = parse_search_response(&response).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[0].metadata,
            Some(ChunkMetadata {
                document_id: DocumentId(5),
                chunk_index: 0
            })
        );
        assert_eq!(hits[0].text, "hello");
        assert_eq!(hits[1].metadata, None);
        assert_eq!(hits[2].metadata, None);
        assert!((hits[0].score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn search_response_without_result_is_an_error() {
        let response = json!({ "status": "error" });
        assert!(matches!(
            parse_search_response(&response),
            Err(SemanticSearchError::BackendResponse { .. })
        ));
    }
}
