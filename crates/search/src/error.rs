use greppy_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Project not indexed: {0}")]
    NotIndexed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("{0}")]
    SchemaMismatch(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Vector store error: {0}")]
    VectorStoreError(VectorStoreError),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}

impl From<VectorStoreError> for SearchError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::EmbeddingUnavailable(msg) => Self::EmbeddingUnavailable(msg),
            VectorStoreError::IndexCorrupt(msg) => Self::IndexCorrupt(msg),
            err @ VectorStoreError::SchemaMismatch { .. } => Self::SchemaMismatch(err.to_string()),
            VectorStoreError::NotFound(msg) => Self::NotIndexed(msg),
            VectorStoreError::IoError(err) => Self::IoError(err),
            other => Self::VectorStoreError(other),
        }
    }
}

impl From<regex::Error> for SearchError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}
