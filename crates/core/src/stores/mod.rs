pub mod memory;
pub mod qdrant;
pub mod sqlite;

pub use memory::{InMemoryDocumentStore, InMemoryVectorIndex};
pub use qdrant::QdrantStore;
pub use sqlite::SqliteDocumentStore;
