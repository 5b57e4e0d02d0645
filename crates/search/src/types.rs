use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Semantic,
    Exact,
}

impl ResultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `file:line` addressed hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Relative to the project root, `/`-separated
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    pub score: f32,
    pub kind: ResultKind,
}

impl SearchResult {
    pub fn exact(file_path: impl Into<String>, line: usize, text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            start_line: line,
            end_line: line,
            snippet: text.into(),
            score: 1.0,
            kind: ResultKind::Exact,
        }
    }

    /// `(line number, text)` for each snippet line, numbered from `start_line`
    pub fn snippet_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.snippet
            .lines()
            .enumerate()
            .map(move |(offset, line)| (self.start_line + offset, line))
    }
}

/// Score descending, then file path, then start line
pub fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then_with(|| a.start_line.cmp(&b.start_line))
}

/// File path, then line
pub fn location_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    a.file_path
        .cmp(&b.file_path)
        .then_with(|| a.start_line.cmp(&b.start_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, line: usize, score: f32) -> SearchResult {
        SearchResult {
            file_path: path.to_string(),
            start_line: line,
            end_line: line + 2,
            snippet: "a\nb\nc".to_string(),
            score,
            kind: ResultKind::Semantic,
        }
    }

    #[test]
    fn ties_break_on_path_then_line() {
        let mut hits = vec![
            hit("b.rs", 1, 0.5),
            hit("a.rs", 9, 0.5),
            hit("a.rs", 3, 0.5),
            hit("z.rs", 1, 0.9),
        ];
        hits.sort_by(rank_order);

        let order: Vec<_> = hits.iter().map(|h| (h.file_path.as_str(), h.start_line)).collect();
        assert_eq!(order, vec![("z.rs", 1), ("a.rs", 3), ("a.rs", 9), ("b.rs", 1)]);
    }

    #[test]
    fn snippet_lines_are_numbered_from_start() {
        let h = hit("a.rs", 10, 1.0);
        let lines: Vec<_> = h.snippet_lines().collect();
        assert_eq!(lines, vec![(10, "a"), (11, "b"), (12, "c")]);
    }
}
