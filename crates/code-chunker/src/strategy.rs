use crate::config::ChunkerConfig;
use crate::types::{ChunkMetadata, CodeChunk};

/// Line-window helpers shared by the fallback path and the structural gap filler
pub struct StrategyExecutor<'a> {
    config: &'a ChunkerConfig,
    lines: &'a [&'a str],
    file_path: &'a str,
    language: &'a str,
}

impl<'a> StrategyExecutor<'a> {
    pub fn new(
        config: &'a ChunkerConfig,
        lines: &'a [&'a str],
        file_path: &'a str,
        language: &'a str,
    ) -> Self {
        Self {
            config,
            lines,
            file_path,
            language,
        }
    }

    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    /// Sliding windows over the whole file; consecutive windows share `overlap_lines`.
    pub fn overlapping_windows(&self) -> Vec<CodeChunk> {
        let total = self.lines.len();
        let window = self.config.window_lines.max(1);
        let step = window.saturating_sub(self.config.overlap_lines).max(1);
        let mut chunks = Vec::new();
        let mut start = 1;

        while start <= total {
            let end = (start + window - 1).min(total);
            if let Some(chunk) = self.make_chunk(start, end, ChunkMetadata::with_language(self.language)) {
                chunks.push(chunk);
            }
            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }

    /// Split `[start, end]` into back-to-back pieces of at most `size` lines, each
    /// carrying a copy of `metadata`. Blank edge lines of the range are trimmed first.
    pub fn split_range(
        &self,
        start: usize,
        end: usize,
        size: usize,
        metadata: &ChunkMetadata,
    ) -> Vec<CodeChunk> {
        let Some((start, end)) = self.trim_blank_edges(start, end) else {
            return Vec::new();
        };
        let size = size.max(1);
        let mut chunks = Vec::new();
        let mut piece_start = start;

        while piece_start <= end {
            let piece_end = (piece_start + size - 1).min(end);
            if let Some((s, e)) = self.trim_blank_edges(piece_start, piece_end) {
                if let Some(chunk) = self.make_chunk(s, e, metadata.clone()) {
                    chunks.push(chunk);
                }
            }
            piece_start = piece_end + 1;
        }

        chunks
    }

    /// Build a chunk for `[start, end]` (1-indexed, inclusive), or `None` when the
    /// range holds nothing searchable.
    pub fn make_chunk(
        &self,
        start: usize,
        end: usize,
        mut metadata: ChunkMetadata,
    ) -> Option<CodeChunk> {
        if start == 0 || start > end || end > self.lines.len() {
            return None;
        }
        let content = self.lines[start - 1..end].join("\n");
        // A named unit is worth keeping however small; anonymous text must look like prose or code.
        let keep = if metadata.label().is_some() {
            has_searchable_text(&content)
        } else {
            is_embeddable(&content)
        };
        if !keep {
            return None;
        }
        metadata.estimated_tokens = ChunkMetadata::estimate_tokens_from_content(&content);
        Some(CodeChunk::new(
            self.file_path.to_string(),
            start,
            end,
            content,
            metadata,
        ))
    }

    fn trim_blank_edges(&self, mut start: usize, mut end: usize) -> Option<(usize, usize)> {
        end = end.min(self.lines.len());
        while start <= end && self.is_blank(start) {
            start += 1;
        }
        while end >= start && self.is_blank(end) {
            end -= 1;
        }
        (start >= 1 && start <= end).then_some((start, end))
    }

    fn is_blank(&self, line: usize) -> bool {
        self.lines
            .get(line.wrapping_sub(1))
            .map_or(true, |l| l.trim().is_empty())
    }
}

/// Shortest trimmed text worth embedding without a symbol name
pub const MIN_ANONYMOUS_CHARS: usize = 10;

/// Share of letters, digits and whitespace below which text is treated as noise
pub const MIN_WORD_CHAR_RATIO: f64 = 0.3;

/// At least one alphanumeric character; blank lines and lone braces are not worth indexing.
pub fn has_searchable_text(content: &str) -> bool {
    content.chars().any(char::is_alphanumeric)
}

/// Stricter check for unlabelled segments: long enough and mostly word characters.
pub fn is_embeddable(content: &str) -> bool {
    let trimmed = content.trim();
    if !has_searchable_text(trimmed) {
        return false;
    }
    let total = trimmed.chars().count();
    if total < MIN_ANONYMOUS_CHARS {
        return false;
    }
    let wordish = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    wordish as f64 / total as f64 >= MIN_WORD_CHAR_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_lines(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("let value_{i} = {i};")).collect()
    }

    fn ranges(chunks: &[CodeChunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start_line, c.end_line)).collect()
    }

    #[test]
    fn windows_overlap_and_cover_the_file() {
        let owned = numbered_lines(120);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "notes.txt", "text");

        let chunks = executor.overlapping_windows();
        assert_eq!(ranges(&chunks), vec![(1, 50), (48, 97), (95, 120)]);
    }

    #[test]
    fn short_file_is_a_single_window() {
        let owned = numbered_lines(7);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "a.txt", "text");

        assert_eq!(ranges(&executor.overlapping_windows()), vec![(1, 7)]);
    }

    #[test]
    fn split_range_trims_blank_edges_and_never_overlaps() {
        let lines = vec!["", "use a;", "use b;", "", "", "use crate::c;", ""];
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "m.rs", "rust");

        let chunks = executor.split_range(1, 7, 2, &ChunkMetadata::default());
        assert_eq!(ranges(&chunks), vec![(2, 3), (6, 6)]);
    }

    #[test]
    fn punctuation_only_ranges_are_dropped() {
        let lines = vec!["}", "", "  };"];
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "m.rs", "rust");

        assert!(executor.make_chunk(1, 3, ChunkMetadata::default()).is_none());
        assert!(!has_searchable_text("{ }"));
        assert!(has_searchable_text("x"));
    }

    #[test]
    fn short_or_symbol_heavy_gaps_are_dropped() {
        let lines = vec!["}", ");", "// a", "", "=>{};]];->>{{}}x", "", "use std::io;"];
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "m.rs", "rust");

        assert!(executor.make_chunk(1, 3, ChunkMetadata::default()).is_none());
        assert!(executor.make_chunk(5, 5, ChunkMetadata::default()).is_none());
        assert_eq!(
            ranges(&executor.split_range(1, 7, 1, &ChunkMetadata::default())),
            vec![(7, 7)]
        );

        assert!(!is_embeddable("// a"));
        assert!(is_embeddable("use std::io;"));
    }

    #[test]
    fn named_units_survive_the_length_floor() {
        let lines = vec!["fn d() {}"];
        let config = ChunkerConfig::default();
        let executor = StrategyExecutor::new(&config, &lines, "d.rs", "rust");

        assert!(executor.make_chunk(1, 1, ChunkMetadata::default()).is_none());
        let named = executor
            .make_chunk(1, 1, ChunkMetadata::default().symbol_name("d"))
            .unwrap();
        assert_eq!(named.content, "fn d() {}");
    }
}
