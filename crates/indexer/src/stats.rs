use greppy_code_chunker::SkipReason;
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics about one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Files in the index after the run
    pub files: usize,

    /// Chunks in the index after the run
    pub chunks: usize,

    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub files_unchanged: usize,

    pub chunks_added: usize,
    pub chunks_removed: usize,

    /// The store was rebuilt from scratch (first run or `force`)
    pub full_rebuild: bool,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language among those (re)chunked
    pub languages: BTreeMap<String, usize>,

    /// Files left out of the index, by reason
    pub skipped: BTreeMap<SkipReason, usize>,

    /// Per-file problems that did not abort the run
    pub warnings: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_language(&mut self, language: &str) {
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Nothing was added, changed or removed
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.full_rebuild
            && self.files_added == 0
            && self.files_modified == 0
            && self.files_deleted == 0
    }
}
