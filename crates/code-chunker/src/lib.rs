//! # Greppy Code Chunker
//!
//! Line-aligned, structure-aware chunking of source files for semantic search.
//!
//! ## Approach
//!
//! - Tree-sitter grammars (Rust, Python, JavaScript, TypeScript) find top-level units:
//!   functions, classes, structs, enums, traits, impls, modules, constants.
//! - Doc comments and attributes directly above a unit belong to it.
//! - Lines between units (imports, top-level statements) become `Other` chunks, so the
//!   whole file stays searchable.
//! - Containers over the line budget are split into their members; other oversized units
//!   are split by line count.
//! - Without a grammar the file is cut into overlapping line windows.
//!
//! ```text
//! bytes ──> inspect_content ──> Language::from_path
//!                                   │
//!                   ┌───────────────┴───────────────┐
//!              AstAnalyzer                    line windows
//!           (units + gaps)                (window_lines / overlap)
//!                   └───────────────┬───────────────┘
//!                              Vec<CodeChunk>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use greppy_code_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//!
//! let code = r#"
//! fn process_data(input: &str) -> String {
//!     input.trim().to_uppercase()
//! }
//! "#;
//!
//! let chunks = chunker.chunk_str(code, Some("example.rs")).unwrap();
//! for chunk in chunks {
//!     println!("Chunk at lines {}-{}: {}",
//!              chunk.start_line, chunk.end_line, chunk.metadata.symbol_name.unwrap_or_default());
//! }
//! ```

mod ast_analyzer;
mod chunker;
mod config;
mod error;
mod filter;
mod language;
mod strategy;
mod types;

pub use chunker::Chunker;
pub use config::{ChunkerConfig, ChunkingStrategy};
pub use error::{ChunkerError, Result};
pub use filter::{inspect_content, SkipReason};
pub use language::Language;
pub use types::{ChunkMetadata, ChunkType, CodeChunk};
