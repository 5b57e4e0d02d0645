//! # Greppy Indexer
//!
//! Incremental project indexing for semantic code search.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> FileScanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Hasher + ChangeSet
//!     │      └─> added / modified / unchanged / deleted
//!     │
//!     ├──> Chunker (AST-aware)
//!     │      └─> Code chunks of changed files only
//!     │
//!     └──> EmbeddingProvider (batched) + VectorStore
//!            └─> index.json, replaced atomically
//! ```
//!
//! `StreamingIndexer` wraps a `ProjectIndexer` with a debounced file watcher.
//!
//! ## Example
//!
//! ```no_run
//! use greppy_indexer::{IndexerConfig, ProjectIndexer};
//! use greppy_vector_store::StubEmbedder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let embedder = Arc::new(StubEmbedder::new(384));
//!     let indexer = ProjectIndexer::for_root("/path/to/project", embedder, IndexerConfig::default())?;
//!     let stats = indexer.index().await?;
//!
//!     println!("Indexed {} files, {} chunks", stats.files, stats.chunks);
//!     Ok(())
//! }
//! ```

mod diff;
mod error;
mod hasher;
mod index_lock;
mod indexer;
mod limits;
mod scanner;
mod state;
mod stats;
mod watcher;

pub use diff::ChangeSet;
pub use error::{IndexerError, Result};
pub use hasher::{fingerprint, read_and_hash, HashedFile};
pub use indexer::{IndexerConfig, ProjectIndexer, DEFAULT_BATCH_SIZE};
pub use limits::{embed_concurrency, DEFAULT_EMBED_CONCURRENCY, EMBED_CONCURRENCY_ENV};
pub use scanner::{FileScanner, ScanReport, IGNORED_SCOPES, MAX_FILE_SIZE_BYTES};
pub use state::IndexerState;
pub use stats::IndexStats;
pub use watcher::{IndexUpdate, IndexerHealth, StreamingIndexer, StreamingIndexerConfig};
