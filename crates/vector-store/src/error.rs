use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error(
        "Schema mismatch: index was built with '{index_model}' ({index_dimension} dims), \
         current model is '{model}' ({dimension} dims); rebuild with `index --force`"
    )]
    SchemaMismatch {
        index_model: String,
        index_dimension: usize,
        model: String,
        dimension: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

impl VectorStoreError {
    pub fn embedding_unavailable(msg: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::IndexCorrupt(msg.into())
    }
}
