use crate::fingerprint::Fingerprint;
use greppy_code_chunker::{ChunkType, CodeChunk};
use serde::{Deserialize, Serialize};

/// On-disk layout version of `index.json`
pub const SCHEMA_VERSION: u32 = 1;

/// A chunk with its embedding, as persisted in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub estimated_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub vector: Vec<f32>,
}

impl StoredChunk {
    #[must_use]
    pub fn from_chunk(id: String, chunk: CodeChunk, vector: Vec<f32>) -> Self {
        let label = chunk.metadata.label().map(str::to_string);
        Self {
            id,
            file_path: chunk.file_path,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content,
            estimated_tokens: chunk.metadata.estimated_tokens,
            label,
            chunk_type: chunk.metadata.chunk_type,
            language: chunk.metadata.language,
            vector,
        }
    }
}

/// What the index knows about one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub fingerprint: Fingerprint,
    pub mtime_ms: u64,
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub schema_version: u32,
    pub model_id: String,
    pub dimension: usize,
    pub project_root: String,
}

impl IndexMeta {
    #[must_use]
    pub fn new(model_id: impl Into<String>, dimension: usize, project_root: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            model_id: model_id.into(),
            dimension,
            project_root: project_root.into(),
        }
    }
}
