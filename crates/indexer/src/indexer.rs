use crate::diff::ChangeSet;
use crate::error::{IndexerError, Result};
use crate::hasher::read_and_hash;
use crate::index_lock::acquire_index_write_lock;
use crate::limits::{acquire_embed_permit, read_concurrency};
use crate::scanner::{FileScanner, ScanReport};
use crate::state::{IndexerState, StateTracker};
use crate::stats::IndexStats;
use greppy_code_chunker::{
    inspect_content, Chunker, ChunkerConfig, CodeChunk, Language, SkipReason,
};
use greppy_vector_store::{
    chunk_id, ensure_dimensions, EmbeddingProvider, FileRecord, Fingerprint, IndexMeta,
    ProjectPaths, StoredChunk, VectorStore, VectorStoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Chunk texts per embedding request
    pub batch_size: usize,
    pub chunker: ChunkerConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunker: ChunkerConfig::default(),
        }
    }
}

/// Project indexer that scans, chunks, embeds and commits one project's index.
///
/// Runs are serialized in-process by a mutex and across processes by a file lock. Each run
/// works on its own copy of the store and publishes it with a single atomic save, so a failed
/// run leaves the previous index untouched.
pub struct ProjectIndexer {
    paths: ProjectPaths,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    config: IndexerConfig,
    run_lock: Mutex<()>,
    state: StateTracker,
}

/// A file that needs (re)embedding, already chunked
struct PreparedFile {
    relative: String,
    fingerprint: Fingerprint,
    mtime_ms: u64,
    chunks: Vec<CodeChunk>,
}

enum FileOutcome {
    Unchanged {
        relative: String,
        fingerprint: Fingerprint,
        mtime_ms: u64,
    },
    Changed(PreparedFile),
    Skipped {
        relative: String,
        reason: SkipReason,
        detail: Option<String>,
    },
}

/// Indexable files as they are on disk right now
#[derive(Default)]
struct Snapshot {
    current: BTreeMap<String, Fingerprint>,
    mtimes: BTreeMap<String, u64>,
    prepared: BTreeMap<String, PreparedFile>,
}

impl ProjectIndexer {
    pub fn new(
        paths: ProjectPaths,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IndexerConfig,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(IndexerError::Other(
                "index batch_size must be at least 1".to_string(),
            ));
        }
        let chunker = Chunker::new(config.chunker.clone())?;

        Ok(Self {
            paths,
            embedder,
            chunker,
            config,
            run_lock: Mutex::new(()),
            state: StateTracker::new(),
        })
    }

    /// Create an indexer for `root` with its index under the process data root
    pub fn for_root(
        root: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IndexerConfig,
    ) -> Result<Self> {
        let paths = ProjectPaths::resolve(root.as_ref()).map_err(|e| match e {
            VectorStoreError::NotFound(msg) => IndexerError::InvalidPath(msg),
            other => other.into(),
        })?;
        Self::new(paths, embedder, config)
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub const fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn store_path(&self) -> PathBuf {
        self.paths.index_file()
    }

    pub const fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn state(&self) -> IndexerState {
        self.state.current()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<IndexerState> {
        self.state.subscribe()
    }

    /// The committed index, or `None` when the project was never indexed
    pub async fn load_store(&self) -> Result<Option<VectorStore>> {
        match VectorStore::load(self.store_path()).await {
            Ok(store) => Ok(Some(store)),
            Err(VectorStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Index the project incrementally
    pub async fn index(&self) -> Result<IndexStats> {
        self.index_with_mode(false).await
    }

    /// Rebuild from scratch, ignoring whatever index is on disk
    pub async fn index_full(&self) -> Result<IndexStats> {
        self.index_with_mode(true).await
    }

    pub async fn index_with_mode(&self, force: bool) -> Result<IndexStats> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();

        match self.run(force).await {
            Ok(mut stats) => {
                stats.time_ms = u64::try_from(started.elapsed().as_millis())
                    .unwrap_or(u64::MAX)
                    .max(1);
                self.state.set(IndexerState::Idle);
                for warning in &stats.warnings {
                    log::warn!("{warning}");
                }
                log::info!(
                    "Indexed {}: +{} ~{} -{} files, +{} -{} chunks (total {}) in {}ms",
                    self.paths.root.display(),
                    stats.files_added,
                    stats.files_modified,
                    stats.files_deleted,
                    stats.chunks_added,
                    stats.chunks_removed,
                    stats.chunks,
                    stats.time_ms
                );
                Ok(stats)
            }
            Err(e) => {
                self.state.set(IndexerState::Failed);
                log::error!("Indexing {} failed: {e}", self.paths.root.display());
                Err(e)
            }
        }
    }

    /// What the next incremental run would do, without writing anything
    pub async fn pending_changes(&self) -> Result<ChangeSet> {
        let existing = self.load_store().await?;
        let scan = self.scan().await?;
        let mut stats = IndexStats::new();
        let snapshot = self
            .snapshot(&scan.files, existing.as_ref(), false, &mut stats)
            .await?;
        Ok(ChangeSet::classify(
            recorded_fingerprints(existing.as_ref()),
            &snapshot.current,
        ))
    }

    async fn run(&self, force: bool) -> Result<IndexStats> {
        self.state.set(IndexerState::Scanning);
        let _lock = acquire_index_write_lock(&self.paths.lock_file()).await?;

        let existing = if force {
            log::info!("Full rebuild of {}", self.paths.root.display());
            None
        } else {
            self.load_store().await?
        };
        if let Some(store) = &existing {
            store.ensure_compatible(self.embedder.model_id(), self.embedder.dimension())?;
        }

        let mut stats = IndexStats::new();
        let scan = self.scan().await?;
        for _ in &scan.large {
            stats.add_skip(SkipReason::Large);
        }

        self.state.set(IndexerState::Diffing);
        let mut snapshot = self
            .snapshot(&scan.files, existing.as_ref(), true, &mut stats)
            .await?;
        let changes = ChangeSet::classify(recorded_fingerprints(existing.as_ref()), &snapshot.current);
        stats.files_added = changes.added.len();
        stats.files_modified = changes.modified.len();
        stats.files_deleted = changes.deleted.len();
        stats.files_unchanged = changes.unchanged.len();
        stats.full_rebuild = existing.is_none();

        if let Some(store) = &existing {
            if !changes.has_changes() {
                stats.files = store.file_count();
                stats.chunks = store.len();
                log::debug!("No changes in {}", self.paths.root.display());
                return Ok(stats);
            }
        }

        let prepared: Vec<PreparedFile> = changes
            .to_embed()
            .filter_map(|relative| snapshot.prepared.remove(relative))
            .collect();
        for file in &prepared {
            stats.add_language(Language::from_path(&file.relative).as_str());
        }
        let texts: Vec<String> = prepared
            .iter()
            .flat_map(|file| file.chunks.iter().map(CodeChunk::embedding_text))
            .collect();

        self.state.set(IndexerState::Embedding);
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.ensure_ready().await?;
            self.embed_all(texts).await?
        };

        self.state.set(IndexerState::Committing);
        let mut store = match existing {
            Some(store) => store,
            None => VectorStore::create(
                self.store_path(),
                IndexMeta::new(
                    self.embedder.model_id(),
                    self.embedder.dimension(),
                    self.paths.root.to_string_lossy(),
                ),
            ),
        };

        for relative in changes.to_remove() {
            stats.chunks_removed += store.delete_for_file(relative).len();
        }
        for relative in &changes.unchanged {
            if let (Some(record), Some(mtime_ms)) =
                (store.file_mut(relative), snapshot.mtimes.get(relative))
            {
                record.mtime_ms = *mtime_ms;
            }
        }

        let mut vectors = vectors.into_iter();
        for file in prepared {
            let mut chunk_ids = Vec::with_capacity(file.chunks.len());
            for (ordinal, chunk) in file.chunks.into_iter().enumerate() {
                let vector = vectors.next().ok_or_else(|| {
                    IndexerError::EmbeddingUnavailable(
                        "provider returned fewer vectors than requested".to_string(),
                    )
                })?;
                let id = chunk_id(&file.relative, ordinal, &file.fingerprint);
                store.upsert(StoredChunk::from_chunk(id.clone(), chunk, vector))?;
                chunk_ids.push(id);
            }
            stats.chunks_added += chunk_ids.len();
            store.put_file(FileRecord {
                path: file.relative,
                fingerprint: file.fingerprint,
                mtime_ms: file.mtime_ms,
                chunk_ids,
            });
        }

        store.save().await?;
        stats.files = store.file_count();
        stats.chunks = store.len();
        Ok(stats)
    }

    async fn scan(&self) -> Result<ScanReport> {
        let root = self.paths.root.clone();
        tokio::task::spawn_blocking(move || FileScanner::new(root).scan())
            .await
            .map_err(|e| IndexerError::Other(format!("scan task failed: {e}")))
    }

    /// Read, hash and filter every scanned file in bounded groups. With `chunk`, files whose
    /// fingerprint differs from the record are chunked too.
    async fn snapshot(
        &self,
        files: &[PathBuf],
        existing: Option<&VectorStore>,
        chunk: bool,
        stats: &mut IndexStats,
    ) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        for group in files.chunks(read_concurrency()) {
            let mut handles = Vec::with_capacity(group.len());
            for path in group {
                let relative = self.normalize_path(path);
                let recorded = existing
                    .and_then(|store| store.file(&relative))
                    .map(|record| record.fingerprint.clone());
                let chunker = chunk.then(|| self.chunker.clone());
                handles.push(tokio::spawn(prepare_file(
                    path.clone(),
                    relative,
                    recorded,
                    chunker,
                )));
            }

            for handle in handles {
                let outcome = handle
                    .await
                    .map_err(|e| IndexerError::Other(format!("file task failed: {e}")))?;
                match outcome {
                    FileOutcome::Unchanged {
                        relative,
                        fingerprint,
                        mtime_ms,
                    } => {
                        snapshot.mtimes.insert(relative.clone(), mtime_ms);
                        snapshot.current.insert(relative, fingerprint);
                    }
                    FileOutcome::Changed(file) => {
                        snapshot
                            .current
                            .insert(file.relative.clone(), file.fingerprint.clone());
                        snapshot.prepared.insert(file.relative.clone(), file);
                    }
                    FileOutcome::Skipped {
                        relative,
                        reason,
                        detail,
                    } => {
                        log::debug!("Skipping {relative} ({reason})");
                        stats.add_skip(reason);
                        if let Some(detail) = detail {
                            stats.add_warning(detail);
                        }
                    }
                }
            }
        }

        Ok(snapshot)
    }

    /// Embed every text, `batch_size` at a time, with batches running concurrently up to the
    /// process-wide permit limit. Output order matches input order.
    async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.batch_size;
        let dimension = self.embedder.dimension();
        let batch_count = texts.len().div_ceil(batch_size);
        log::debug!("Embedding {} chunks in {batch_count} batches", texts.len());

        let mut tasks = JoinSet::new();
        for (index, batch) in texts.chunks(batch_size).enumerate() {
            let batch = batch.to_vec();
            let embedder = Arc::clone(&self.embedder);
            tasks.spawn(async move {
                let _permit = acquire_embed_permit().await;
                let expected = batch.len();
                (index, expected, embedder.embed_batch(&batch).await)
            });
        }

        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; batch_count];
        while let Some(joined) = tasks.join_next().await {
            let (index, expected, result) = joined
                .map_err(|e| IndexerError::Other(format!("embedding task failed: {e}")))?;
            let vectors = result?;
            if vectors.len() != expected {
                return Err(IndexerError::EmbeddingUnavailable(format!(
                    "provider returned {} vectors for {expected} texts",
                    vectors.len()
                )));
            }
            ensure_dimensions(&vectors, dimension)?;
            slots[index] = Some(vectors);
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }

    fn normalize_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.paths.root).unwrap_or(path);
        let mut normalized = relative.to_string_lossy().to_string();
        if normalized.contains('\\') {
            normalized = normalized.replace('\\', "/");
        }
        normalized
    }
}

fn recorded_fingerprints<'a>(
    store: Option<&'a VectorStore>,
) -> impl Iterator<Item = (&'a str, &'a Fingerprint)> + 'a {
    store
        .into_iter()
        .flat_map(|store| store.files())
        .map(|record| (record.path.as_str(), &record.fingerprint))
}

async fn prepare_file(
    path: PathBuf,
    relative: String,
    recorded: Option<Fingerprint>,
    chunker: Option<Chunker>,
) -> FileOutcome {
    let hashed = match read_and_hash(path, relative.clone()).await {
        Ok(hashed) => hashed,
        Err(e) => {
            return FileOutcome::Skipped {
                relative,
                reason: SkipReason::Error,
                detail: Some(e.to_string()),
            }
        }
    };

    if recorded.as_ref() == Some(&hashed.fingerprint) {
        return FileOutcome::Unchanged {
            relative,
            fingerprint: hashed.fingerprint,
            mtime_ms: hashed.mtime_ms,
        };
    }

    let text = match inspect_content(&hashed.bytes) {
        Ok(text) => text,
        Err(reason) => {
            return FileOutcome::Skipped {
                relative,
                reason,
                detail: None,
            }
        }
    };

    let chunks = match &chunker {
        None => Vec::new(),
        Some(chunker) => match chunker.chunk_str(text, Some(&relative)) {
            Ok(chunks) => chunks,
            Err(e) if e.is_skip() => {
                return FileOutcome::Skipped {
                    relative,
                    reason: SkipReason::Empty,
                    detail: None,
                }
            }
            Err(e) => {
                return FileOutcome::Skipped {
                    detail: Some(format!("{relative}: {e}")),
                    relative,
                    reason: SkipReason::Error,
                }
            }
        },
    };

    FileOutcome::Changed(PreparedFile {
        relative,
        fingerprint: hashed.fingerprint,
        mtime_ms: hashed.mtime_ms,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use greppy_vector_store::StubEmbedder;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn indexer(data: &TempDir, project: &TempDir, batch_size: usize) -> ProjectIndexer {
        let paths = ProjectPaths::resolve_in(data.path(), project.path()).unwrap();
        let config = IndexerConfig {
            batch_size,
            ..IndexerConfig::default()
        };
        ProjectIndexer::new(paths, Arc::new(StubEmbedder::new(32)), config).unwrap()
    }

    #[tokio::test]
    async fn first_run_indexes_everything() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            project.path().join("main.rs"),
            "fn main() {\n    println!(\"hi\");\n}\n",
        )
        .unwrap();
        std::fs::write(project.path().join("util.py"), "def add(a, b):\n    return a + b\n")
            .unwrap();

        let indexer = indexer(&data, &project, DEFAULT_BATCH_SIZE);
        let stats = indexer.index().await.unwrap();

        assert!(stats.full_rebuild);
        assert_eq!(stats.files_added, 2);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.chunks, stats.chunks_added);
        assert!(stats.time_ms >= 1);
        assert_eq!(stats.languages.get("rust"), Some(&1));
        assert_eq!(stats.languages.get("python"), Some(&1));
        assert_eq!(indexer.state(), IndexerState::Idle);
        assert!(indexer.store_path().is_file());
    }

    #[tokio::test]
    async fn small_batches_keep_vectors_aligned_with_chunks() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut source = String::new();
        for i in 0..12 {
            source.push_str(&format!("fn handler_{i}() {{\n    work_{i}();\n}}\n\n"));
        }
        std::fs::write(project.path().join("lib.rs"), &source).unwrap();

        let indexer = indexer(&data, &project, 1);
        indexer.index().await.unwrap();

        let store = indexer.load_store().await.unwrap().unwrap();
        let stub = StubEmbedder::new(32);
        for chunk in store.chunks() {
            let header = chunk
                .label
                .as_deref()
                .map(|label| format!(" :: {label}"))
                .unwrap_or_default();
            let text = format!("{}{header}\n{}", chunk.file_path, chunk.content);
            assert_eq!(chunk.vector, stub.embed_text(&text), "{}", chunk.id);
        }
        assert!(store.len() >= 12);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let paths = ProjectPaths::resolve_in(data.path(), project.path()).unwrap();
        let config = IndexerConfig {
            batch_size: 0,
            ..IndexerConfig::default()
        };
        assert!(ProjectIndexer::new(paths, Arc::new(StubEmbedder::new(8)), config).is_err());
    }

    #[test]
    fn normalize_path_is_root_relative_with_forward_slashes() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let indexer = indexer(&data, &project, 4);
        let path = indexer.root().join("src").join("lib.rs");
        assert_eq!(indexer.normalize_path(&path), "src/lib.rs");
    }
}
