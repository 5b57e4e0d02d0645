use crate::ast_analyzer::{AstAnalyzer, SyntaxUnit};
use crate::config::{ChunkerConfig, ChunkingStrategy};
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::strategy::StrategyExecutor;
use crate::types::{ChunkMetadata, ChunkType, CodeChunk};

/// Main chunker interface for processing code
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk code from a string. Chunks come back ordered by start line.
    pub fn chunk_str(&self, content: &str, file_path: Option<&str>) -> Result<Vec<CodeChunk>> {
        let file_path = file_path.unwrap_or("unknown");
        self.chunk_with_language(content, file_path, Language::from_path(file_path))
    }

    /// Chunk code with explicit language
    pub fn chunk_with_language(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeChunk>> {
        if content.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }

        let lines: Vec<&str> = content.lines().collect();
        let executor = StrategyExecutor::new(&self.config, &lines, file_path, language.as_str());

        if language.supports_ast() && self.config.strategy == ChunkingStrategy::Structural {
            match AstAnalyzer::new(language).and_then(|mut analyzer| analyzer.analyze(content)) {
                Ok(units) => return Ok(self.chunk_units(&executor, &units, language)),
                Err(e) => {
                    log::warn!("AST chunking failed for {file_path}, falling back to line windows: {e}");
                }
            }
        }

        Ok(executor.overlapping_windows())
    }

    /// Cover the whole file: units become chunks, the lines between them become `Other` chunks.
    fn chunk_units(
        &self,
        executor: &StrategyExecutor<'_>,
        units: &[SyntaxUnit],
        language: Language,
    ) -> Vec<CodeChunk> {
        let gap_metadata = ChunkMetadata::with_language(language.as_str()).chunk_type(ChunkType::Other);
        let mut chunks = Vec::new();
        self.cover_range(
            executor,
            1,
            executor.total_lines(),
            units,
            &gap_metadata,
            language,
            &mut chunks,
        );
        chunks
    }

    #[allow(clippy::too_many_arguments)]
    fn cover_range(
        &self,
        executor: &StrategyExecutor<'_>,
        start: usize,
        end: usize,
        units: &[SyntaxUnit],
        gap_metadata: &ChunkMetadata,
        language: Language,
        out: &mut Vec<CodeChunk>,
    ) {
        let mut cursor = start;
        for unit in units {
            if unit.start_line < cursor || unit.end_line > end {
                continue;
            }
            if unit.start_line > cursor {
                out.extend(executor.split_range(
                    cursor,
                    unit.start_line - 1,
                    self.config.window_lines,
                    gap_metadata,
                ));
            }
            self.emit_unit(executor, unit, language, out);
            cursor = unit.end_line + 1;
        }
        if cursor <= end {
            out.extend(executor.split_range(cursor, end, self.config.window_lines, gap_metadata));
        }
    }

    fn emit_unit(
        &self,
        executor: &StrategyExecutor<'_>,
        unit: &SyntaxUnit,
        language: Language,
        out: &mut Vec<CodeChunk>,
    ) {
        let metadata = unit_metadata(unit, language);
        let max_lines = self.config.max_chunk_lines;

        if unit.line_count() <= max_lines {
            out.extend(executor.make_chunk(unit.start_line, unit.end_line, metadata));
            return;
        }

        if unit.chunk_type.is_container() && !unit.members.is_empty() {
            // Header, fields and closing lines stay with the container's label.
            self.cover_range(
                executor,
                unit.start_line,
                unit.end_line,
                &unit.members,
                &metadata,
                language,
                out,
            );
            return;
        }

        out.extend(executor.split_range(unit.start_line, unit.end_line, max_lines, &metadata));
    }
}

fn unit_metadata(unit: &SyntaxUnit, language: Language) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::with_language(language.as_str()).chunk_type(unit.chunk_type);
    metadata.symbol_name.clone_from(&unit.symbol_name);
    metadata.parent_scope.clone_from(&unit.parent_scope);
    metadata.qualified_name.clone_from(&unit.qualified_name);
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ranges(chunks: &[CodeChunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start_line, c.end_line)).collect()
    }

    #[test]
    fn test_chunk_str() {
        let chunker = Chunker::default();
        let code = "fn main() {\n    println!(\"Hello\");\n}\n";
        let chunks = chunker.chunk_str(code, Some("test.rs")).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.symbol_name.as_deref(), Some("main"));
        assert_eq!(chunks[0].metadata.chunk_type, Some(ChunkType::Function));
        assert_eq!(chunks[0].metadata.language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_chunk_empty_content() {
        let chunker = Chunker::default();
        assert!(matches!(
            chunker.chunk_str("", Some("test.rs")),
            Err(ChunkerError::EmptyContent)
        ));
        assert!(matches!(
            chunker.chunk_str("\n  \n", Some("test.rs")),
            Err(ChunkerError::EmptyContent)
        ));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let config = ChunkerConfig {
            window_lines: 0,
            ..ChunkerConfig::default()
        };
        assert!(Chunker::new(config).is_err());
    }

    #[test]
    fn gaps_between_units_are_kept() {
        let code = r"use std::io;
use std::fmt;

fn a() {
    do_a();
}

static COUNTER: u32 = 0;
let_statement_like_noise!();

fn b() {}
";
        let chunks = Chunker::default().chunk_str(code, Some("lib.rs")).unwrap();
        assert_eq!(
            ranges(&chunks),
            vec![(1, 2), (4, 6), (8, 8), (9, 9), (11, 11)]
        );
        assert_eq!(chunks[0].metadata.chunk_type, Some(ChunkType::Other));
        assert_eq!(chunks[2].metadata.chunk_type, Some(ChunkType::Variable));
        assert_eq!(chunks[4].metadata.symbol_name.as_deref(), Some("b"));
    }

    #[test]
    fn oversized_container_splits_into_members() {
        let mut code = String::from("impl Engine {\n");
        for i in 0..4 {
            code.push_str(&format!("    fn step_{i}(&self) {{\n"));
            for j in 0..20 {
                code.push_str(&format!("        let v{j} = {j};\n"));
            }
            code.push_str("    }\n\n");
        }
        code.push_str("}\n");

        let config = ChunkerConfig {
            window_lines: 20,
            overlap_lines: 2,
            max_chunk_lines: 40,
            ..ChunkerConfig::default()
        };
        let chunks = Chunker::new(config).unwrap().chunk_str(&code, Some("engine.rs")).unwrap();

        let header = &chunks[0];
        assert_eq!((header.start_line, header.end_line), (1, 1));
        assert_eq!(header.metadata.chunk_type, Some(ChunkType::Impl));

        let methods: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.chunk_type == Some(ChunkType::Method))
            .map(|c| c.metadata.qualified_name.clone().unwrap_or_default())
            .collect();
        assert_eq!(
            methods,
            vec!["Engine::step_0", "Engine::step_1", "Engine::step_2", "Engine::step_3"]
        );
    }

    #[test]
    fn oversized_unit_splits_by_line_budget_and_keeps_label() {
        let mut code = String::from("fn long() {\n");
        for i in 0..200 {
            code.push_str(&format!("    let x{i} = {i};\n"));
        }
        code.push_str("}\n");

        let chunks = Chunker::default().chunk_str(&code, Some("long.rs")).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 120), (121, 202)]);
        assert!(chunks
            .iter()
            .all(|c| c.metadata.symbol_name.as_deref() == Some("long")));
    }

    #[test]
    fn structural_chunks_never_overlap() {
        let code = include_str!("strategy.rs");
        let chunks = Chunker::default().chunk_str(code, Some("strategy.rs")).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[0].end_line < pair[1].start_line, "{pair:?}");
        }
    }

    #[test]
    fn unknown_language_uses_overlapping_windows() {
        let code: String = (1..=60).map(|i| format!("line {i}\n")).collect();
        let chunks = Chunker::default().chunk_str(&code, Some("notes.txt")).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 50), (48, 60)]);
        assert!(chunks.iter().all(|c| c.metadata.chunk_type.is_none()));
    }

    #[test]
    fn line_window_strategy_skips_the_parser() {
        let code = "fn a() {}\n\nfn b() {}\n";
        let chunker = Chunker::new(ChunkerConfig::line_windows()).unwrap();
        let chunks = chunker.chunk_str(code, Some("lib.rs")).unwrap();
        assert_eq!(ranges(&chunks), vec![(1, 3)]);
    }
}
