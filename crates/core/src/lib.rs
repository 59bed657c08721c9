pub mod chunking;
pub mod correction;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use chunking::{build_chunks, chunk_text, ChunkingConfig};
pub use correction::CorrectionService;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ConfigurationError, CorrectionError, EmbeddingError, ExtractionError, IndexWriteError,
    IngestError, SemanticSearchError, StorageError,
};
pub use extractor::{DefaultTextExtractor, TextExtractor, PDF_MEDIA_TYPE};
pub use ingest::{
    discover_files, media_type_for_path, IngestionPipeline, IngestionReport, TEXT_MEDIA_TYPE,
};
pub use llm::OllamaChat;
pub use models::{
    ChunkMetadata, Document, DocumentId, IndexEntry, IngestionOptions, NewDocument, SearchHit,
    SimilarityQuery, Upload,
};
pub use orchestrator::{FallbackReason, SearchOutcome, SearchResolver};
pub use stores::{InMemoryDocumentStore, InMemoryVectorIndex, QdrantStore, SqliteDocumentStore};
pub use traits::{DocumentStore, LanguageModel, VectorIndex};
