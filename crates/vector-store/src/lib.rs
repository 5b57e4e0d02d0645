//! # Greppy Vector Store
//!
//! Per-project persistence of chunks, embeddings and file fingerprints.
//!
//! ## Features
//!
//! - **Embedding providers** behind one async trait (Ollama over HTTP, offline stub)
//! - **Exact cosine search** over every stored vector
//! - **Deterministic JSON** storage with atomic replace on save
//! - **Content fingerprints** and stable chunk ids for incremental indexing
//!
//! ## Architecture
//!
//! ```text
//! CodeChunk[]
//!     │
//!     ├──> EmbeddingProvider (Ollama / stub)
//!     │      └─> Vec<f32> [dimension]
//!     │
//!     ├──> FlatIndex
//!     │      └─> cosine top-k
//!     │
//!     └──> <data root>/projects/<id>/index.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use greppy_vector_store::{EmbeddingProvider, StubEmbedder, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = VectorStore::load("index.json").await?;
//!     let embedder = StubEmbedder::new(store.meta().dimension);
//!     store.ensure_compatible(embedder.model_id(), embedder.dimension())?;
//!
//!     let query = embedder.embed("async function error handling").await?;
//!     for (id, score) in store.query(&query, 10)? {
//!         if let Some(chunk) = store.get(&id) {
//!             println!("{}:{} {score:.3}", chunk.file_path, chunk.start_line);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod fingerprint;
mod flat_index;
pub mod paths;
mod store;
mod types;

pub use embeddings::{
    cosine_similarity, create_embedder, ensure_dimensions, truncate_text, EmbeddingConfig,
    EmbeddingMode, EmbeddingProvider, OllamaEmbedder, StubEmbedder, DEFAULT_DIMENSION,
    DEFAULT_MODEL, DEFAULT_OLLAMA_URL, MAX_TEXT_CHARS, STUB_MODEL_ID,
};
pub use error::{Result, VectorStoreError};
pub use fingerprint::{chunk_id, fingerprint_bytes, Fingerprint};
pub use paths::ProjectPaths;
pub use store::VectorStore;
pub use types::{FileRecord, IndexMeta, StoredChunk, SCHEMA_VERSION};

// Re-export code chunker types for convenience
pub use greppy_code_chunker::{ChunkMetadata, ChunkType, CodeChunk};
