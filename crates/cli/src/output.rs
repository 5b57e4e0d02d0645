//! Plain-text renderings of command results. Everything here goes to stdout.

use greppy_indexer::{ChangeSet, IndexStats, IndexUpdate};
use greppy_search::{ReadWindow, SearchResult};

pub const NO_MATCHES: &str = "No matches found.";
pub const NO_RESULTS: &str = "No results found.";
const BLOCK_SEPARATOR: &str = "--";

/// One-line outcome of an `index` run
pub fn index_summary(stats: &IndexStats) -> String {
    if stats.full_rebuild {
        format!("Indexed {} files, {} chunks", stats.files, stats.chunks)
    } else if stats.is_noop() {
        format!("Index up to date ({} chunks)", stats.chunks)
    } else {
        format!(
            "Done! +{} -{} chunks (total: {})",
            stats.chunks_added, stats.chunks_removed, stats.chunks
        )
    }
}

/// `Skipped 3 files: 2 binary, 1 large`, or `None` when nothing was skipped
pub fn skipped_summary(stats: &IndexStats) -> Option<String> {
    let total = stats.skipped_total();
    if total == 0 {
        return None;
    }
    let parts: Vec<String> = stats
        .skipped
        .iter()
        .map(|(reason, count)| format!("{count} {reason}"))
        .collect();
    let noun = if total == 1 { "file" } else { "files" };
    Some(format!("Skipped {total} {noun}: {}", parts.join(", ")))
}

/// Semantic hits as `path:start-end (score 0.xx)` blocks of `path:line: text`
pub fn search_results(results: &[SearchResult]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            lines.push(BLOCK_SEPARATOR.to_string());
        }
        lines.push(format!(
            "{}:{}-{} (score {:.2})",
            result.file_path, result.start_line, result.end_line, result.score
        ));
        lines.extend(
            result
                .snippet_lines()
                .map(|(line, text)| format!("{}:{line}: {text}", result.file_path)),
        );
    }
    lines
}

/// Exact hits as `path:line: text`, with `--` between files
pub fn exact_results(results: &[SearchResult]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<&str> = None;
    for result in results {
        if current.is_some_and(|path| path != result.file_path) {
            lines.push(BLOCK_SEPARATOR.to_string());
        }
        current = Some(&result.file_path);
        lines.push(format!(
            "{}:{}: {}",
            result.file_path, result.start_line, result.snippet
        ));
    }
    lines
}

/// `# path (lines a-b of N)` then one numbered line per file line
pub fn read_window(window: &ReadWindow) -> Vec<String> {
    let mut lines = vec![window.header()];
    lines.extend(
        window
            .numbered_lines()
            .map(|(n, text)| format!("{n:>6}\t{text}")),
    );
    lines
}

/// `+a ~m -d files`, or `Up to date`
pub fn pending_summary(changes: &ChangeSet) -> String {
    if changes.has_changes() {
        format!(
            "Pending: +{} ~{} -{} files",
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len()
        )
    } else {
        "Up to date".to_string()
    }
}

/// One line per completed watcher run
pub fn watch_update(update: &IndexUpdate) -> String {
    match (&update.stats, &update.error) {
        (Some(stats), _) if update.success => format!(
            "Updated {} files: +{} ~{} -{} files, +{} -{} chunks (total: {}) in {}ms",
            update.paths.len(),
            stats.files_added,
            stats.files_modified,
            stats.files_deleted,
            stats.chunks_added,
            stats.chunks_removed,
            stats.chunks,
            update.duration_ms
        ),
        (_, Some(error)) => format!("Update failed ({}): {error}", update.reason),
        _ => format!("Update finished ({})", update.reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greppy_code_chunker::SkipReason;
    use greppy_search::ResultKind;
    use pretty_assertions::assert_eq;

    fn hit(path: &str, line: usize, snippet: &str, score: f32) -> SearchResult {
        SearchResult {
            file_path: path.to_string(),
            start_line: line,
            end_line: line + snippet.lines().count() - 1,
            snippet: snippet.to_string(),
            score,
            kind: ResultKind::Semantic,
        }
    }

    #[test]
    fn index_summary_variants() {
        let mut stats = IndexStats::new();
        stats.full_rebuild = true;
        stats.files = 3;
        stats.chunks = 12;
        assert_eq!(index_summary(&stats), "Indexed 3 files, 12 chunks");

        stats.full_rebuild = false;
        assert_eq!(index_summary(&stats), "Index up to date (12 chunks)");

        stats.files_modified = 1;
        stats.chunks_added = 4;
        stats.chunks_removed = 2;
        stats.chunks = 14;
        assert_eq!(index_summary(&stats), "Done! +4 -2 chunks (total: 14)");
    }

    #[test]
    fn skipped_summary_lists_reasons() {
        let mut stats = IndexStats::new();
        assert_eq!(skipped_summary(&stats), None);
        stats.add_skip(SkipReason::Binary);
        stats.add_skip(SkipReason::Binary);
        stats.add_skip(SkipReason::Large);
        assert_eq!(
            skipped_summary(&stats).unwrap(),
            "Skipped 3 files: 2 binary, 1 large"
        );
    }

    #[test]
    fn search_blocks_are_separated() {
        let lines = search_results(&[
            hit("src/a.rs", 10, "fn a() {\n}", 0.912),
            hit("src/b.rs", 3, "fn b() {}", 0.5),
        ]);
        assert_eq!(
            lines,
            vec![
                "src/a.rs:10-11 (score 0.91)",
                "src/a.rs:10: fn a() {",
                "src/a.rs:11: }",
                "--",
                "src/b.rs:3-3 (score 0.50)",
                "src/b.rs:3: fn b() {}",
            ]
        );
    }

    #[test]
    fn exact_lines_break_between_files() {
        let lines = exact_results(&[
            SearchResult::exact("a.rs", 1, "// TODO"),
            SearchResult::exact("a.rs", 7, "// todo"),
            SearchResult::exact("b.py", 2, "# Todo"),
        ]);
        assert_eq!(lines, vec!["a.rs:1: // TODO", "a.rs:7: // todo", "--", "b.py:2: # Todo"]);
    }

    #[test]
    fn read_lines_are_numbered() {
        let window = ReadWindow {
            path: "src/x.rs".into(),
            start_line: 9,
            end_line: 10,
            total_lines: 40,
            lines: vec!["let a = 1;".to_string(), "let b = 2;".to_string()],
        };
        assert_eq!(
            read_window(&window),
            vec![
                "# src/x.rs (lines 9-10 of 40)",
                "     9\tlet a = 1;",
                "    10\tlet b = 2;",
            ]
        );
    }

    #[test]
    fn pending_summary_counts_files() {
        let mut changes = ChangeSet::default();
        assert_eq!(pending_summary(&changes), "Up to date");
        changes.added.push("a.rs".into());
        changes.deleted.push("b.rs".into());
        assert_eq!(pending_summary(&changes), "Pending: +1 ~0 -1 files");
    }
}
