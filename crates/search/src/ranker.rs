use crate::error::{Result, SearchError};
use crate::fusion::WeightedFusion;
use crate::keyword::{keyword_overlap, terms};
use crate::types::{rank_order, ResultKind, SearchResult};
use greppy_vector_store::{EmbeddingProvider, ProjectPaths, StoredChunk, VectorStore};
use std::sync::Arc;

/// Candidates fetched from the store per requested result
pub const CANDIDATE_MULTIPLIER: usize = 5;

/// Lines of chunk content carried in a semantic hit
pub const SNIPPET_MAX_LINES: usize = 8;

/// Semantic search over one project's index
pub struct SearchRanker {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    fusion: WeightedFusion,
}

impl SearchRanker {
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbeddingProvider>, fusion: WeightedFusion) -> Self {
        Self {
            store,
            embedder,
            fusion,
        }
    }

    /// Load a snapshot of the project's committed index
    pub async fn open(
        paths: &ProjectPaths,
        embedder: Arc<dyn EmbeddingProvider>,
        fusion: WeightedFusion,
    ) -> Result<Self> {
        if !paths.index_exists() {
            return Err(SearchError::NotIndexed(paths.root.display().to_string()));
        }
        let store = VectorStore::load(paths.index_file()).await?;
        Ok(Self::new(store, embedder, fusion))
    }

    pub const fn store(&self) -> &VectorStore {
        &self.store
    }

    pub const fn fusion(&self) -> &WeightedFusion {
        &self.fusion
    }

    /// Top `k` chunks for `query`, best first
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        self.store
            .ensure_compatible(self.embedder.model_id(), self.embedder.dimension())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let pool = k.saturating_mul(CANDIDATE_MULTIPLIER).max(k);
        let candidates = self.store.query(&vector, pool)?;
        log::debug!(
            "Search: query='{}', k={}, {} candidates (hybrid={})",
            query,
            k,
            candidates.len(),
            self.fusion.enabled
        );

        let query_terms = terms(query);
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|(id, cosine)| {
                let chunk = self.store.get(&id)?;
                let keyword = if self.fusion.enabled {
                    keyword_overlap(&query_terms, &keyword_text(chunk))
                } else {
                    0.0
                };
                Some(to_result(chunk, self.fusion.combine(cosine, keyword)))
            })
            .collect();

        results.sort_by(rank_order);
        results.truncate(k);
        Ok(results)
    }
}

fn keyword_text(chunk: &StoredChunk) -> String {
    match &chunk.label {
        Some(label) => format!("{label}\n{}", chunk.content),
        None => chunk.content.clone(),
    }
}

fn to_result(chunk: &StoredChunk, score: f32) -> SearchResult {
    let snippet = chunk
        .content
        .lines()
        .take(SNIPPET_MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    SearchResult {
        file_path: chunk.file_path.clone(),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        snippet,
        score,
        kind: ResultKind::Semantic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greppy_vector_store::{IndexMeta, StubEmbedder};
    use tempfile::TempDir;

    fn chunk(id: &str, path: &str, line: usize, content: &str, embedder: &StubEmbedder) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            file_path: path.to_string(),
            start_line: line,
            end_line: line + content.lines().count().saturating_sub(1),
            content: content.to_string(),
            estimated_tokens: content.len() / 4,
            label: None,
            chunk_type: None,
            language: Some("rust".to_string()),
            vector: embedder.embed_text(content),
        }
    }

    fn ranker(fusion: WeightedFusion) -> (TempDir, SearchRanker) {
        let dir = TempDir::new().unwrap();
        let embedder = StubEmbedder::new(64);
        let mut store = VectorStore::create(
            dir.path().join("index.json"),
            IndexMeta::new("stub", 64, "/project"),
        );
        let chunks = [
            chunk("a", "src/parse.rs", 1, "fn parse_config(path: &Path) -> Config {}", &embedder),
            chunk("b", "src/net.rs", 10, "async fn open_socket(addr: SocketAddr) {}", &embedder),
            chunk("c", "src/parse.rs", 20, "fn parse_args(args: Vec<String>) {}", &embedder),
        ];
        for c in chunks {
            store.upsert(c).unwrap();
        }
        (dir, SearchRanker::new(store, Arc::new(embedder), fusion))
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (_dir, ranker) = ranker(WeightedFusion::default());
        assert!(matches!(ranker.search("   ", 5).await, Err(SearchError::EmptyQuery)));
    }

    #[tokio::test]
    async fn results_are_truncated_and_ordered() {
        let (_dir, ranker) = ranker(WeightedFusion::default());
        let results = ranker.search("parse config", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_path, "src/parse.rs");
        assert_eq!(results[0].start_line, 1);
        assert!(results[0].score >= results[1].score);
        assert!(results.iter().all(|r| r.kind == ResultKind::Semantic));
    }

    #[tokio::test]
    async fn repeated_queries_are_deterministic() {
        let (_dir, ranker) = ranker(WeightedFusion::default());
        let first = ranker.search("socket address", 3).await.unwrap();
        let second = ranker.search("socket address", 3).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn disabled_fusion_scores_are_cosine() {
        let (_dir, ranker) = ranker(WeightedFusion::disabled());
        let results = ranker.search("open socket", 1).await.unwrap();

        let embedder = StubEmbedder::new(64);
        let expected = greppy_vector_store::cosine_similarity(
            &embedder.embed_text("open socket"),
            &ranker.store().get("b").unwrap().vector,
        );
        assert_eq!(results[0].file_path, "src/net.rs");
        assert!((results[0].score - expected).abs() < 1e-5);
    }

    #[tokio::test]
    async fn model_change_is_schema_mismatch() {
        let (_dir, ranker) = ranker(WeightedFusion::default());
        let other = SearchRanker::new(
            ranker.store,
            Arc::new(StubEmbedder::new(32)),
            WeightedFusion::default(),
        );
        assert!(matches!(other.search("parse", 3).await, Err(SearchError::SchemaMismatch(_))));
    }

    #[tokio::test]
    async fn missing_index_is_not_indexed() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let paths = ProjectPaths::resolve_in(data.path(), project.path()).unwrap();
        let result = SearchRanker::open(&paths, Arc::new(StubEmbedder::new(8)), WeightedFusion::default()).await;
        assert!(matches!(result, Err(SearchError::NotIndexed(_))));
    }
}
