use async_trait::async_trait;
use greppy_code_chunker::SkipReason;
use greppy_indexer::{IndexerConfig, IndexerError, IndexerState, ProjectIndexer};
use greppy_vector_store::{
    EmbeddingProvider, ProjectPaths, StubEmbedder, VectorStore, VectorStoreError,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 32;

struct Project {
    data: TempDir,
    root: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            data: TempDir::new().unwrap(),
            root: TempDir::new().unwrap(),
        }
    }

    fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn remove(&self, relative: &str) {
        std::fs::remove_file(self.root.path().join(relative)).unwrap();
    }

    fn paths(&self) -> ProjectPaths {
        ProjectPaths::resolve_in(self.data.path(), self.root.path()).unwrap()
    }

    fn indexer(&self, embedder: Arc<dyn EmbeddingProvider>) -> ProjectIndexer {
        ProjectIndexer::new(self.paths(), embedder, IndexerConfig::default()).unwrap()
    }

    fn stub_indexer(&self) -> ProjectIndexer {
        self.indexer(Arc::new(StubEmbedder::new(DIM)))
    }

    fn index_bytes(&self) -> Vec<u8> {
        std::fs::read(self.paths().index_file()).unwrap()
    }

    async fn store(&self) -> VectorStore {
        VectorStore::load(self.paths().index_file()).await.unwrap()
    }
}

/// Stub vectors, but counts every text it is asked to embed
struct CountingEmbedder {
    inner: StubEmbedder,
    texts: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: StubEmbedder::new(DIM),
            texts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed_batch(&self, texts: &[String]) -> greppy_vector_store::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

/// Same identity as the stub, but the provider is down
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed_batch(&self, _texts: &[String]) -> greppy_vector_store::Result<Vec<Vec<f32>>> {
        Err(VectorStoreError::embedding_unavailable("connection refused"))
    }
}

fn chunk_ids(store: &VectorStore, path: &str) -> Vec<String> {
    store
        .file(path)
        .map(|record| record.chunk_ids.clone())
        .unwrap_or_default()
}

fn seed(project: &Project) {
    project.write(
        "src/a.rs",
        "/// Adds numbers\npub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n",
    );
    project.write(
        "src/b.py",
        "def greet(name):\n    return f\"hello {name}\"\n",
    );
    project.write(
        "web/c.js",
        "function logLine(msg) {\n  console.log(msg);\n}\n",
    );
}

#[tokio::test]
async fn second_run_without_changes_is_a_byte_identical_noop() {
    let project = Project::new();
    seed(&project);
    let indexer = project.stub_indexer();

    let first = indexer.index().await.unwrap();
    assert!(first.full_rebuild);
    assert_eq!(first.files, 3);
    let before = project.index_bytes();

    let second = indexer.index().await.unwrap();
    assert!(second.is_noop());
    assert_eq!(second.files_unchanged, 3);
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(project.index_bytes(), before);
}

#[tokio::test]
async fn unchanged_modified_and_deleted_files() {
    let project = Project::new();
    seed(&project);
    let indexer = project.stub_indexer();
    indexer.index().await.unwrap();

    let store = project.store().await;
    let a_ids = chunk_ids(&store, "src/a.rs");
    let b_ids = chunk_ids(&store, "src/b.py");
    let c_ids = chunk_ids(&store, "web/c.js");
    assert!(!a_ids.is_empty() && !b_ids.is_empty() && !c_ids.is_empty());

    project.write(
        "src/b.py",
        "def greet(name):\n    return f\"hi {name}\"\n\n\ndef part(name):\n    return f\"bye {name}\"\n",
    );
    project.remove("web/c.js");

    let stats = indexer.index().await.unwrap();
    assert_eq!(
        (stats.files_added, stats.files_modified, stats.files_deleted, stats.files_unchanged),
        (0, 1, 1, 1)
    );
    assert_eq!(stats.chunks_removed, b_ids.len() + c_ids.len());

    let store = project.store().await;
    assert_eq!(chunk_ids(&store, "src/a.rs"), a_ids);

    let new_b = chunk_ids(&store, "src/b.py");
    assert_eq!(new_b.len(), stats.chunks_added);
    assert!(new_b.iter().all(|id| !b_ids.contains(id)));
    assert!(store.chunks().any(|c| c.content.contains("bye")));

    assert!(store.file("web/c.js").is_none());
    assert!(store.chunks().all(|c| c.file_path != "web/c.js"));
    assert!(c_ids.iter().all(|id| store.get(id).is_none()));
    assert_eq!(store.len(), a_ids.len() + new_b.len());
}

#[tokio::test]
async fn modifying_one_file_embeds_only_its_chunks() {
    let project = Project::new();
    seed(&project);
    let embedder = Arc::new(CountingEmbedder::new());
    let indexer = project.indexer(embedder.clone());

    let first = indexer.index().await.unwrap();
    assert_eq!(embedder.texts.load(Ordering::SeqCst), first.chunks);

    project.write("src/a.rs", "pub fn add(a: i64, b: i64) -> i64 {\n    a + b\n}\n");
    let second = indexer.index().await.unwrap();

    let a_chunks = chunk_ids(&project.store().await, "src/a.rs").len();
    assert_eq!(second.chunks_added, a_chunks);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), first.chunks + a_chunks);
}

#[tokio::test]
async fn provider_failure_keeps_the_previous_index() {
    let project = Project::new();
    seed(&project);
    project.stub_indexer().index().await.unwrap();
    let before = project.index_bytes();

    project.write("src/new.rs", "pub fn fresh() -> bool {\n    true\n}\n");
    let failing = project.indexer(Arc::new(FailingEmbedder));
    let mut state = failing.subscribe_state();

    let err = failing.index().await.unwrap_err();
    assert!(matches!(err, IndexerError::EmbeddingUnavailable(_)), "{err}");
    assert_eq!(failing.state(), IndexerState::Failed);
    assert_eq!(*state.borrow_and_update(), IndexerState::Failed);
    assert_eq!(project.index_bytes(), before);

    // A failed indexer can run again once the provider is back.
    let recovered = project.stub_indexer();
    let stats = recovered.index().await.unwrap();
    assert_eq!(stats.files_added, 1);
    assert_eq!(recovered.state(), IndexerState::Idle);
}

#[tokio::test]
async fn model_change_requires_force() {
    let project = Project::new();
    seed(&project);
    project.stub_indexer().index().await.unwrap();

    let other = project.indexer(Arc::new(StubEmbedder::new(DIM / 2)));
    let err = other.index().await.unwrap_err();
    assert!(matches!(err, IndexerError::SchemaMismatch(_)), "{err}");
    assert!(err.to_string().contains("index --force"));

    let stats = other.index_full().await.unwrap();
    assert!(stats.full_rebuild);
    assert_eq!(project.store().await.meta().dimension, DIM / 2);
}

#[tokio::test]
async fn corrupt_index_is_reported_and_force_rebuilds() {
    let project = Project::new();
    seed(&project);
    let indexer = project.stub_indexer();
    indexer.index().await.unwrap();

    std::fs::write(project.paths().index_file(), b"{ not json").unwrap();
    let err = indexer.index().await.unwrap_err();
    assert!(matches!(err, IndexerError::IndexCorrupt(_)), "{err}");
    assert!(indexer.pending_changes().await.is_err());

    let stats = indexer.index_full().await.unwrap();
    assert_eq!(stats.files, 3);
    assert_eq!(project.store().await.file_count(), 3);
}

#[tokio::test]
async fn unindexable_content_is_skipped_by_reason() {
    let project = Project::new();
    seed(&project);
    project.write("blob.txt", b"abc\0def".as_slice());
    project.write("notes.md", [0xffu8, 0xfe, b'a', b'\n'].as_slice());
    project.write("empty.py", "   \n\n");
    project.write("bundle.js", format!("var x={};\n", "1,".repeat(1500)));

    let stats = project.stub_indexer().index().await.unwrap();
    assert_eq!(stats.files, 3);
    assert_eq!(stats.skipped.get(&SkipReason::Binary), Some(&1));
    assert_eq!(stats.skipped.get(&SkipReason::Encoding), Some(&1));
    assert_eq!(stats.skipped.get(&SkipReason::Empty), Some(&1));
    assert_eq!(stats.skipped.get(&SkipReason::Minified), Some(&1));

    let store = project.store().await;
    assert!(store.file("blob.txt").is_none());
    assert!(store.file("bundle.js").is_none());
}

#[tokio::test]
async fn file_that_becomes_binary_leaves_the_index() {
    let project = Project::new();
    seed(&project);
    let indexer = project.stub_indexer();
    indexer.index().await.unwrap();

    project.write("src/b.py", b"\0\0\0".as_slice());
    let stats = indexer.index().await.unwrap();
    assert_eq!(stats.files_deleted, 1);
    assert_eq!(stats.skipped.get(&SkipReason::Binary), Some(&1));
    assert!(project.store().await.file("src/b.py").is_none());
}

#[tokio::test]
async fn pending_changes_reports_without_writing() {
    let project = Project::new();
    seed(&project);
    let indexer = project.stub_indexer();

    let fresh = indexer.pending_changes().await.unwrap();
    assert_eq!(fresh.added, vec!["src/a.rs", "src/b.py", "web/c.js"]);
    assert!(!project.paths().index_exists());

    indexer.index().await.unwrap();
    assert!(!indexer.pending_changes().await.unwrap().has_changes());
    let before = project.index_bytes();

    project.write("src/d.rs", "fn d() {}\n");
    project.write("src/a.rs", "pub fn add() {}\n");
    project.remove("web/c.js");

    let changes = indexer.pending_changes().await.unwrap();
    assert_eq!(changes.added, vec!["src/d.rs"]);
    assert_eq!(changes.modified, vec!["src/a.rs"]);
    assert_eq!(changes.deleted, vec!["web/c.js"]);
    assert_eq!(changes.unchanged, vec!["src/b.py"]);
    assert_eq!(project.index_bytes(), before);
}

#[tokio::test]
async fn empty_project_still_creates_an_index() {
    let project = Project::new();
    let stats = project.stub_indexer().index().await.unwrap();
    assert_eq!((stats.files, stats.chunks), (0, 0));
    assert!(project.paths().index_exists());
    assert!(Path::new(&project.store().await.meta().project_root).is_absolute());
}

#[tokio::test]
async fn concurrent_runs_are_serialized() {
    let project = Project::new();
    seed(&project);
    let indexer = Arc::new(project.stub_indexer());

    let (a, b) = tokio::join!(indexer.index(), indexer.index());
    let (a, b) = (a.unwrap(), b.unwrap());
    // Exactly one of them did the work.
    assert!(a.full_rebuild ^ b.full_rebuild);
    assert_eq!(project.store().await.file_count(), 3);
}
