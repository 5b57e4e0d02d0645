//! # Greppy Search
//!
//! Query side of greppy: ranked semantic search over a project's index,
//! exact pattern search over raw files, and `file:line` windows for reading
//! the code behind a hit.
//!
//! ```text
//! query ──> EmbeddingProvider ──> VectorStore::query (k * 5)
//!                                     │
//!                                     └─> WeightedFusion(cosine, keyword overlap) ──> top k
//!
//! pattern ──> PatternMatcher (rg | regex walk) ──> path:line hits
//! ```

mod error;
pub mod exact;
mod fusion;
mod keyword;
mod ranker;
pub mod reader;
mod types;

pub use error::{Result, SearchError};
pub use exact::{
    matcher_for, ExactEngine, ExactQuery, PatternMatcher, RegexMatcher, RipgrepMatcher,
    EXACT_ENGINE_ENV,
};
pub use fusion::{WeightedFusion, DEFAULT_KEYWORD_WEIGHT, DEFAULT_VECTOR_WEIGHT};
pub use keyword::{keyword_overlap, terms};
pub use ranker::{SearchRanker, CANDIDATE_MULTIPLIER, SNIPPET_MAX_LINES};
pub use reader::{read, Locator, ReadWindow, Selection, DEFAULT_CONTEXT_LINES};
pub use types::{location_order, rank_order, ResultKind, SearchResult};
