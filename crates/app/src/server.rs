//! HTTP surface.
//!
//! | Method   | Path              | Response                              |
//! |----------|-------------------|---------------------------------------|
//! | `GET`    | `/health`         | `OK`                                  |
//! | `POST`   | `/documents`      | stored document (multipart `file`)    |
//! | `GET`    | `/documents`      | every stored document                 |
//! | `DELETE` | `/documents/{id}` | 204, or 404 for an unknown id         |
//! | `GET`    | `/search?q=`      | matching documents                    |
//! | `POST`   | `/autocorrect`    | corrected, unsaved document           |
//!
//! Errors use `{ "error": { "code": "...", "message": "..." } }`.

use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use docsearch_core::{
    media_type_for_path, CorrectionError, Document, DocumentId, IngestError, NewDocument,
    StorageError, Upload,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
const OCTET_STREAM: &str = "application/octet-stream";

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_upload).get(handle_list))
        .route("/documents/{id}", delete(handle_delete))
        .route("/search", get(handle_search))
        .route("/autocorrect", post(handle_autocorrect))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "docsearch listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("docsearch stopped");
    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "ctrl-c handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
}

// ============ Errors ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "storage failure");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "storage",
            message: err.to_string(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Extraction(err) => bad_request(err.to_string()),
            IngestError::Storage(err) => err.into(),
            IngestError::Configuration(err) => {
                error!(error = %err, "invalid chunking configuration");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<CorrectionError> for AppError {
    fn from(err: CorrectionError) -> Self {
        match err {
            CorrectionError::Extraction(err) => bad_request(err.to_string()),
            other => {
                warn!(error = %other, "correction failed");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "correction_failed",
                    message: other.to_string(),
                }
            }
        }
    }
}

// ============ Multipart ============

/// Reads the `file` part and the optional `description` part. A missing or
/// generic content type is replaced by one guessed from the file name.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut file: Option<(Option<String>, Option<String>, Vec<u8>)> = None;
    let mut description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| bad_request(err.to_string()))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            Some("description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| bad_request(err.to_string()))?;
                description = Some(text);
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| bad_request("missing multipart field `file`"))?;

    let content_type = match content_type {
        Some(declared) if declared != OCTET_STREAM => declared,
        _ => media_type_for_path(std::path::Path::new(filename.as_deref().unwrap_or_default()))
            .to_string(),
    };

    Ok(Upload {
        bytes,
        content_type,
        filename,
        description,
    })
}

// ============ Handlers ============

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Document>, AppError> {
    let upload = read_upload(multipart).await?;
    let document = state.pipeline.ingest(upload).await?;
    Ok(Json(document))
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.store.find_all().await?))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_by_id(DocumentId(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("document {id} not found")))
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.resolver.search(&params.q).await?))
}

async fn handle_autocorrect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<NewDocument>, AppError> {
    let upload = read_upload(multipart).await?;
    Ok(Json(state.corrector.correct_file(upload).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use docsearch_core::{
        CharacterNgramEmbedder, DocumentStore, InMemoryDocumentStore, InMemoryVectorIndex,
        IngestionOptions, LanguageModel, SimilarityQuery,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docsearch-test-boundary";

    struct FixedModel(Result<&'static str, &'static str>);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, CorrectionError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(details) => Err(CorrectionError::BackendResponse {
                    backend: "fake".to_string(),
                    details: details.to_string(),
                }),
            }
        }
    }

    fn test_state(model: FixedModel) -> (AppState, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let index = Arc::new(InMemoryVectorIndex::new(Arc::new(
            CharacterNgramEmbedder::default(),
        )));
        let state = AppState::new(
            store.clone(),
            index,
            Arc::new(model),
            IngestionOptions::default(),
            SimilarityQuery::default(),
        )
        .unwrap();
        (state, store)
    }

    fn multipart_request(
        uri: &str,
        filename: &str,
        content_type: Option<&str>,
        body: &[u8],
        description: Option<&str>,
    ) -> Request<Body> {
        let mut payload = Vec::new();
        payload.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        payload.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        if let Some(content_type) = content_type {
            payload.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        payload.extend_from_slice(b"\r\n");
        payload.extend_from_slice(body);
        payload.extend_from_slice(b"\r\n");
        if let Some(description) = description {
            payload.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{description}\r\n"
                )
                .as_bytes(),
            );
        }
        payload.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(payload))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (state, _store) = test_state(FixedModel(Ok("")));
        let response = router(state).oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn upload_persists_and_returns_the_document() {
        let (state, store) = test_state(FixedModel(Ok("")));
        let request = multipart_request(
            "/documents",
            "hello.txt",
            Some("text/plain"),
            b"Hello world, this is a test file.",
            Some("greeting"),
        );

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["filename"], "hello.txt");
        assert_eq!(body["contentType"], "text/plain");
        assert_eq!(body["contentText"], "Hello world, this is a test file.");
        assert_eq!(body["description"], "greeting");
        assert!(body["id"].is_i64());
        assert!(body["uploadedAt"].is_string());
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_without_content_type_is_typed_from_the_name() {
        let (state, store) = test_state(FixedModel(Ok("")));
        let request = multipart_request("/documents", "notes.md", None, b"plain notes", None);

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let stored = store.find_all().await.unwrap();
        assert_eq!(stored[0].content_type, "text/plain");
        assert_eq!(stored[0].description, None);
    }

    #[tokio::test]
    async fn malformed_pdf_is_rejected_and_not_stored() {
        let (state, store) = test_state(FixedModel(Ok("")));
        let request = multipart_request(
            "/documents",
            "broken.pdf",
            Some("application/pdf"),
            b"%PDF-1.4\n%broken",
            None,
        );

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_part_is_a_bad_request() {
        let (state, _store) = test_state(FixedModel(Ok("")));
        let payload = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nonly text\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(payload))
            .unwrap();

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn uploaded_text_is_searchable() {
        let (state, _store) = test_state(FixedModel(Ok("")));
        let app = router(state);

        let upload = multipart_request(
            "/documents",
            "hello.txt",
            Some("text/plain"),
            b"Hello world, this is a test file.",
            None,
        );
        assert_eq!(app.clone().oneshot(upload).await.unwrap().status(), StatusCode::OK);

        let response = app.oneshot(get("/search?q=world")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let documents = body.as_array().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["filename"], "hello.txt");
    }

    #[tokio::test]
    async fn search_for_unknown_text_is_empty() {
        let (state, _store) = test_state(FixedModel(Ok("")));
        let response = router(state)
            .oneshot(get("/search?q=nothing%20matches"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn autocorrect_returns_unsaved_document() {
        let (state, store) = test_state(FixedModel(Ok("Hello world.")));
        let request = multipart_request(
            "/autocorrect",
            "draft.txt",
            Some("text/plain"),
            b"helo wrld",
            None,
        );

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["contentText"], "Hello world.");
        assert_eq!(body["filename"], "draft.txt");
        assert_eq!(body["description"], "Grammar/Spelling corrected version");
        assert!(body.get("id").is_none());
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn autocorrect_model_failure_is_a_bad_gateway() {
        let (state, _store) = test_state(FixedModel(Err("model not loaded")));
        let request = multipart_request("/autocorrect", "draft.txt", Some("text/plain"), b"x", None);

        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"]["code"], "correction_failed");
    }

    #[tokio::test]
    async fn documents_can_be_listed_and_deleted() {
        let (state, store) = test_state(FixedModel(Ok("")));
        let saved = store
            .save(NewDocument {
                filename: Some("a.txt".to_string()),
                content_type: "text/plain".to_string(),
                content_text: "alpha".to_string(),
                description: None,
                uploaded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let app = router(state);

        let listed = json_body(app.clone().oneshot(get("/documents")).await.unwrap()).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let delete = |id: i64| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/documents/{id}"))
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(delete(saved.id.0)).await.unwrap();
        assert_eq!(first.status(), StatusCode::NO_CONTENT);

        let second = app.oneshot(delete(saved.id.0)).await.unwrap();
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(second).await["error"]["code"], "not_found");
    }
}
