use greppy_code_chunker::ChunkerError;
use greppy_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Cannot read {path}: {source}")]
    IoUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("{0}")]
    SchemaMismatch(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(VectorStoreError),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn io_unavailable(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoUnavailable {
            path: path.into(),
            source,
        }
    }

    /// True for failures that invalidate a whole run rather than one file
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::IoUnavailable { .. })
    }
}

impl From<VectorStoreError> for IndexerError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::EmbeddingUnavailable(msg) => Self::EmbeddingUnavailable(msg),
            VectorStoreError::IndexCorrupt(msg) => Self::IndexCorrupt(msg),
            err @ VectorStoreError::SchemaMismatch { .. } => Self::SchemaMismatch(err.to_string()),
            VectorStoreError::IoError(err) => Self::IoError(err),
            other => Self::VectorStoreError(other),
        }
    }
}
