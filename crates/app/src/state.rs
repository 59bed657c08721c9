use anyhow::Context;
use clap::{Args, ValueEnum};
use docsearch_core::{
    CharacterNgramEmbedder, ConfigurationError, CorrectionService, DefaultTextExtractor,
    DocumentStore, Embedder, InMemoryDocumentStore, InMemoryVectorIndex, IngestionOptions,
    IngestionPipeline, LanguageModel, OllamaChat, OllamaEmbedder, QdrantStore, SearchResolver,
    SimilarityQuery, SqliteDocumentStore, TextExtractor, VectorIndex,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const IN_MEMORY_DATABASE: &str = "memory";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    Ngram,
    Ollama,
}

/// Backend selection shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// SQLite URL for document rows, or `memory` for a throwaway store.
    #[arg(
        long,
        env = "DOCSEARCH_DATABASE_URL",
        default_value = "sqlite://docsearch.db",
        global = true
    )]
    pub database_url: String,

    #[arg(long, env = "DOCSEARCH_VECTOR_INDEX", value_enum, default_value = "qdrant", global = true)]
    pub vector_index: VectorBackend,

    /// Qdrant base URL
    #[arg(long, env = "DOCSEARCH_QDRANT_URL", default_value = "http://localhost:6333", global = true)]
    pub qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "DOCSEARCH_QDRANT_COLLECTION", default_value = "document_chunks", global = true)]
    pub qdrant_collection: String,

    #[arg(long, env = "DOCSEARCH_EMBEDDER", value_enum, default_value = "ngram", global = true)]
    pub embedder: EmbedderKind,

    /// Ollama base URL, used for embeddings and corrections.
    #[arg(long, env = "DOCSEARCH_OLLAMA_URL", default_value = "http://localhost:11434", global = true)]
    pub ollama_url: String,

    #[arg(long, env = "DOCSEARCH_EMBEDDING_MODEL", default_value = "nomic-embed-text", global = true)]
    pub embedding_model: String,

    /// Must match the output size of the embedding model.
    #[arg(long, env = "DOCSEARCH_EMBEDDING_DIMENSIONS", default_value = "768", global = true)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "DOCSEARCH_CHAT_MODEL", default_value = "llama3.1", global = true)]
    pub chat_model: String,

    #[arg(long, env = "DOCSEARCH_HTTP_TIMEOUT_SECS", default_value = "30", global = true)]
    pub http_timeout_secs: u64,

    #[arg(long, default_value = "800", global = true)]
    pub chunk_max_chars: usize,

    #[arg(long, default_value = "120", global = true)]
    pub chunk_overlap_chars: usize,

    #[arg(long, default_value = "10", global = true)]
    pub top_k: usize,

    #[arg(long, default_value = "0.5", global = true)]
    pub similarity_threshold: f32,
}

impl BackendArgs {
    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: self.chunk_max_chars,
            chunk_overlap_chars: self.chunk_overlap_chars,
        }
    }

    fn similarity_query(&self) -> SimilarityQuery {
        SimilarityQuery {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

/// Long-lived services, built once and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub resolver: Arc<SearchResolver>,
    pub corrector: Arc<CorrectionService>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        ingestion: IngestionOptions,
        similarity: SimilarityQuery,
    ) -> Result<Self, ConfigurationError> {
        let extractor: Arc<dyn TextExtractor> = Arc::new(DefaultTextExtractor);

        Ok(Self {
            pipeline: Arc::new(IngestionPipeline::new(
                extractor.clone(),
                store.clone(),
                index.clone(),
                ingestion,
            )?),
            resolver: Arc::new(SearchResolver::with_options(store.clone(), index, similarity)),
            corrector: Arc::new(CorrectionService::new(extractor, model)),
            store,
        })
    }

    pub async fn connect(args: &BackendArgs) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(args.http_timeout_secs);

        let store: Arc<dyn DocumentStore> = if args.database_url == IN_MEMORY_DATABASE {
            info!("using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        } else {
            let store = SqliteDocumentStore::connect(&args.database_url)
                .await
                .with_context(|| format!("opening database {}", args.database_url))?;
            info!(database_url = %args.database_url, "document store ready");
            Arc::new(store)
        };

        let embedder: Arc<dyn Embedder> = match args.embedder {
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
            EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
                &args.ollama_url,
                &args.embedding_model,
                args.embedding_dimensions,
                timeout,
            )?),
        };

        let index: Arc<dyn VectorIndex> = match args.vector_index {
            VectorBackend::Memory => Arc::new(InMemoryVectorIndex::new(embedder)),
            VectorBackend::Qdrant => {
                let qdrant = QdrantStore::new(
                    &args.qdrant_url,
                    &args.qdrant_collection,
                    embedder,
                    timeout,
                )?;
                // Search still works through the keyword fallback while Qdrant is down.
                if let Err(error) = qdrant.ensure_collection().await {
                    warn!(
                        qdrant_url = %args.qdrant_url,
                        error = %error,
                        "qdrant collection unavailable"
                    );
                }
                Arc::new(qdrant)
            }
        };

        let model: Arc<dyn LanguageModel> =
            Arc::new(OllamaChat::new(&args.ollama_url, &args.chat_model, timeout)?);

        Ok(Self::new(
            store,
            index,
            model,
            args.ingestion_options(),
            args.similarity_query(),
        )?)
    }
}
