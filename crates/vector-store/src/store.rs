use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::types::{FileRecord, IndexMeta, StoredChunk, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Serialized form of `index.json`. Sorted maps keep the bytes stable across saves.
#[derive(Serialize, Deserialize)]
struct IndexDocument {
    meta: IndexMeta,
    files: BTreeMap<String, FileRecord>,
    chunks: BTreeMap<String, StoredChunk>,
}

/// One project's chunks, vectors and file records
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    meta: IndexMeta,
    files: BTreeMap<String, FileRecord>,
    chunks: BTreeMap<String, StoredChunk>,
}

impl VectorStore {
    /// Empty store that will be written to `path` on `save`
    pub fn create(path: impl AsRef<Path>, meta: IndexMeta) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            meta,
            files: BTreeMap::new(),
            chunks: BTreeMap::new(),
        }
    }

    /// Load store from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading VectorStore from {}", path.display());
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorStoreError::NotFound(format!(
                    "no index at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let doc: IndexDocument = serde_json::from_slice(&data)
            .map_err(|e| VectorStoreError::corrupt(format!("{}: {e}", path.display())))?;

        let store = Self {
            path: path.to_path_buf(),
            meta: doc.meta,
            files: doc.files,
            chunks: doc.chunks,
        };
        store.validate()?;

        log::debug!(
            "Loaded {} chunks across {} files",
            store.chunks.len(),
            store.files.len()
        );
        Ok(store)
    }

    /// Structural invariants: known schema, uniform dimension, every chunk owned by exactly
    /// one file record and every referenced chunk present.
    pub fn validate(&self) -> Result<()> {
        if self.meta.schema_version != SCHEMA_VERSION {
            return Err(VectorStoreError::corrupt(format!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                self.meta.schema_version
            )));
        }

        for (id, chunk) in &self.chunks {
            if chunk.vector.len() != self.meta.dimension {
                return Err(VectorStoreError::corrupt(format!(
                    "chunk {id} has {} dims, index declares {}",
                    chunk.vector.len(),
                    self.meta.dimension
                )));
            }
            if &chunk.id != id {
                return Err(VectorStoreError::corrupt(format!(
                    "chunk stored under {id} carries id {}",
                    chunk.id
                )));
            }
        }

        let mut owned = BTreeSet::new();
        for (path, record) in &self.files {
            for id in &record.chunk_ids {
                if !self.chunks.contains_key(id) {
                    return Err(VectorStoreError::corrupt(format!(
                        "{path} references missing chunk {id}"
                    )));
                }
                if !owned.insert(id.as_str()) {
                    return Err(VectorStoreError::corrupt(format!(
                        "chunk {id} is referenced more than once"
                    )));
                }
            }
        }

        if let Some(orphan) = self.chunks.keys().find(|id| !owned.contains(id.as_str())) {
            return Err(VectorStoreError::corrupt(format!(
                "chunk {orphan} is not referenced by any file"
            )));
        }

        Ok(())
    }

    /// Fails with `SchemaMismatch` when the index was built by a different model.
    pub fn ensure_compatible(&self, model_id: &str, dimension: usize) -> Result<()> {
        if self.meta.model_id == model_id && self.meta.dimension == dimension {
            return Ok(());
        }
        Err(VectorStoreError::SchemaMismatch {
            index_model: self.meta.model_id.clone(),
            index_dimension: self.meta.dimension,
            model: model_id.to_string(),
            dimension,
        })
    }

    /// Insert or replace a chunk
    pub fn upsert(&mut self, chunk: StoredChunk) -> Result<()> {
        if chunk.vector.len() != self.meta.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.meta.dimension,
                actual: chunk.vector.len(),
            });
        }
        self.chunks.insert(chunk.id.clone(), chunk);
        Ok(())
    }

    /// Remove one chunk and its reference from the owning file record
    pub fn delete(&mut self, chunk_id: &str) -> Option<StoredChunk> {
        let removed = self.chunks.remove(chunk_id)?;
        if let Some(record) = self.files.get_mut(&removed.file_path) {
            record.chunk_ids.retain(|id| id != chunk_id);
        }
        Some(removed)
    }

    /// Remove a file record and every chunk it owns; returns the removed chunk ids.
    pub fn delete_for_file(&mut self, path: &str) -> Vec<String> {
        let Some(record) = self.files.remove(path) else {
            return Vec::new();
        };
        for id in &record.chunk_ids {
            self.chunks.remove(id);
        }
        record.chunk_ids
    }

    pub fn put_file(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.files.get_mut(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&StoredChunk> {
        self.chunks.get(chunk_id)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &StoredChunk> {
        self.chunks.values()
    }

    /// Top `k` chunk ids by cosine similarity to `vector`
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        let mut index = FlatIndex::new(self.meta.dimension);
        for chunk in self.chunks.values() {
            index.add(&chunk.id, &chunk.vector)?;
        }
        index.search(vector, k)
    }

    pub const fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get total number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write to a sibling temp file, then rename over the index.
    pub async fn save(&self) -> Result<()> {
        self.validate()?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let doc = IndexDocument {
            meta: self.meta.clone(),
            files: self.files.clone(),
            chunks: self.chunks.clone(),
        };
        let data = serde_json::to_vec(&doc)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        log::debug!(
            "Saved {} chunks to {}",
            self.chunks.len(),
            self.path.display()
        );
        Ok(())
    }
}
