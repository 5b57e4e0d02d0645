use crate::error::{Result, SearchError};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONTEXT_LINES: usize = 50;

/// Which lines of a file to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First `context` lines
    Head,
    /// `context` lines centered on a line
    Line(usize),
    /// Inclusive line range; reversed bounds are swapped
    Range(usize, usize),
}

impl Selection {
    /// Requested `(start, end)` before clamping to the file
    pub fn bounds(self, context: usize) -> (usize, usize) {
        match self {
            Self::Head => (1, context),
            Self::Line(line) => {
                let half = context / 2;
                (line.saturating_sub(half).max(1), line.saturating_add(half))
            }
            Self::Range(a, b) => (a.min(b).max(1), a.max(b)),
        }
    }
}

/// `path`, `path:line` or `path:start-end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub path: PathBuf,
    pub selection: Selection,
}

impl Locator {
    /// A suffix that does not parse as a line or range stays part of the path.
    pub fn parse(raw: &str) -> Self {
        if let Some((path, suffix)) = raw.rsplit_once(':') {
            if !path.is_empty() {
                if let Some(selection) = parse_selection(suffix) {
                    return Self {
                        path: PathBuf::from(path),
                        selection,
                    };
                }
            }
        }
        Self {
            path: PathBuf::from(raw),
            selection: Selection::Head,
        }
    }
}

fn parse_selection(suffix: &str) -> Option<Selection> {
    match suffix.split_once('-') {
        Some((start, end)) => Some(Selection::Range(
            start.trim().parse().ok()?,
            end.trim().parse().ok()?,
        )),
        None => suffix.trim().parse().ok().map(Selection::Line),
    }
}

/// A clamped slice of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadWindow {
    pub path: PathBuf,
    /// First line shown (1-based)
    pub start_line: usize,
    /// Last line shown, inclusive
    pub end_line: usize,
    pub total_lines: usize,
    pub lines: Vec<String>,
}

impl ReadWindow {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(offset, line)| (self.start_line + offset, line.as_str()))
    }

    pub fn header(&self) -> String {
        if self.is_empty() {
            format!(
                "# {} (no lines in {}-{}; {} total)",
                self.path.display(),
                self.start_line,
                self.end_line,
                self.total_lines
            )
        } else {
            format!(
                "# {} (lines {}-{} of {})",
                self.path.display(),
                self.start_line,
                self.end_line,
                self.total_lines
            )
        }
    }
}

/// Read the lines `selection` picks from `path`.
///
/// Invalid UTF-8 is replaced rather than rejected. A window that falls
/// entirely outside the file is returned empty.
pub async fn read(path: &Path, selection: Selection, context: usize) -> Result<ReadWindow> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SearchError::not_found(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let total_lines = all.len();

    let (start, end) = selection.bounds(context);
    let clamped_end = end.min(total_lines);
    let lines = if start <= clamped_end {
        all[start - 1..clamped_end]
            .iter()
            .map(|line| (*line).to_string())
            .collect()
    } else {
        Vec::new()
    };

    Ok(ReadWindow {
        path: path.to_path_buf(),
        start_line: start,
        end_line: if lines.is_empty() { end } else { clamped_end },
        total_lines,
        lines,
    })
}
