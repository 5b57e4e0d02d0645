//! Exact pattern search over raw project files.
//!
//! Independent of the index: results reflect the files on disk right now.

use crate::error::{Result, SearchError};
use crate::types::{location_order, SearchResult};
use greppy_indexer::IGNORED_SCOPES;
use ignore::WalkBuilder;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

/// Bytes inspected for a NUL when deciding a file is binary
const BINARY_SNIFF_BYTES: usize = 8192;

pub const EXACT_ENGINE_ENV: &str = "GREPPY_EXACT_ENGINE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactQuery {
    pub pattern: String,
    pub root: PathBuf,
    pub case_insensitive: bool,
    pub max_results: Option<usize>,
}

impl ExactQuery {
    pub fn new(pattern: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            root: root.into(),
            case_insensitive: false,
            max_results: None,
        }
    }

    #[must_use]
    pub const fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    #[must_use]
    pub const fn max_results(mut self, limit: Option<usize>) -> Self {
        self.max_results = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if !self.root.is_dir() && !self.root.is_file() {
            return Err(SearchError::not_found(self.root.display().to_string()));
        }
        Ok(())
    }

    /// `root` names one file rather than a tree
    fn targets_file(&self) -> bool {
        self.root.is_file()
    }
}

/// Line-oriented pattern matcher over a directory tree or a single file
pub trait PatternMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Matching lines ordered by path then line number
    fn find(&self, query: &ExactQuery) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExactEngine {
    /// `rg` when installed, otherwise the built-in matcher
    #[default]
    Auto,
    Builtin,
    #[serde(rename = "rg", alias = "ripgrep")]
    Ripgrep,
}

impl FromStr for ExactEngine {
    type Err = SearchError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "builtin" => Ok(Self::Builtin),
            "rg" | "ripgrep" => Ok(Self::Ripgrep),
            other => Err(SearchError::Other(format!(
                "Unsupported {EXACT_ENGINE_ENV} '{other}' (expected 'auto', 'builtin' or 'rg')"
            ))),
        }
    }
}

pub fn matcher_for(engine: ExactEngine) -> Box<dyn PatternMatcher> {
    match engine {
        ExactEngine::Builtin => Box::new(RegexMatcher),
        ExactEngine::Ripgrep => Box::new(RipgrepMatcher::default()),
        ExactEngine::Auto => {
            let rg = RipgrepMatcher::default();
            if rg.is_available() {
                Box::new(rg)
            } else {
                log::debug!("rg not found on PATH, using built-in matcher");
                Box::new(RegexMatcher)
            }
        }
    }
}

// ============ Built-in ============

/// `regex` over an `ignore` walk. Binary files are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexMatcher;

impl PatternMatcher for RegexMatcher {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn find(&self, query: &ExactQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;
        let regex = RegexBuilder::new(&query.pattern)
            .case_insensitive(query.case_insensitive)
            .build()?;
        let limit = query.max_results.unwrap_or(usize::MAX);

        let files = if query.targets_file() {
            vec![(display_path(&query.root), query.root.clone())]
        } else {
            walk_files(&query.root)
        };

        let mut results = Vec::new();
        for (relative, path) in files {
            if results.len() >= limit {
                break;
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::debug!("Skipping unreadable {}: {e}", path.display());
                    continue;
                }
            };
            if looks_binary(&bytes) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            for (idx, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    results.push(SearchResult::exact(relative.as_str(), idx + 1, line));
                    if results.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(results)
    }
}

/// Files under `root` as `(relative '/'-path, absolute path)`, sorted by relative path
fn walk_files(root: &Path) -> Vec<(String, PathBuf)> {
    let mut files: Vec<(String, PathBuf)> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            let name = entry.file_name().to_string_lossy();
            !(is_dir && entry.depth() > 0 && IGNORED_SCOPES.iter().any(|scope| *scope == name))
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            let relative = relative_path(root, entry.path())?;
            Some((relative, entry.into_path()))
        })
        .collect();
    files.sort();
    files
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// A file root is reported the way it was given, '/'-separated and without a leading `./`
fn display_path(path: &Path) -> String {
    let shown = path.to_string_lossy().replace('\\', "/");
    shown.strip_prefix("./").unwrap_or(&shown).to_string()
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}

// ============ ripgrep ============

/// Shells out to `rg`
#[derive(Debug, Clone)]
pub struct RipgrepMatcher {
    program: PathBuf,
}

impl Default for RipgrepMatcher {
    fn default() -> Self {
        Self::new("rg")
    }
}

impl RipgrepMatcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn command(&self, query: &ExactQuery) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-n", "--no-heading", "--with-filename", "--null", "--color=never"])
            .args(["--sort", "path", "--no-require-git"]);
        if query.case_insensitive {
            cmd.arg("-i");
        }
        if query.targets_file() {
            cmd.arg("-e").arg(&query.pattern).arg(&query.root);
        } else {
            cmd.current_dir(&query.root);
            for scope in IGNORED_SCOPES {
                cmd.arg("--glob").arg(format!("!{scope}/"));
            }
            cmd.arg("-e").arg(&query.pattern).arg(".");
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl PatternMatcher for RipgrepMatcher {
    fn name(&self) -> &'static str {
        "rg"
    }

    fn find(&self, query: &ExactQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;
        let output = self.command(query).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SearchError::Other(format!("{} is not installed", self.program.display()))
            } else {
                SearchError::IoError(e)
            }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(0) => {}
            // No matches
            Some(1) => return Ok(Vec::new()),
            // Partial failures (unreadable files) still print the matches found
            Some(2) if !output.stdout.is_empty() => {
                log::warn!("rg reported errors: {}", first_line(&stderr));
            }
            _ if stderr.contains("regex parse error") => {
                return Err(SearchError::InvalidPattern(stderr.trim().to_string()));
            }
            _ => {
                return Err(SearchError::Other(format!("rg failed: {}", first_line(&stderr))));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut results: Vec<SearchResult> = stdout
            .lines()
            .filter_map(parse_rg_line)
            .collect();
        results.sort_by(location_order);
        if let Some(limit) = query.max_results {
            results.truncate(limit);
        }
        Ok(results)
    }
}

/// `./path\0line:text` as printed by `rg -n --no-heading --null`
fn parse_rg_line(line: &str) -> Option<SearchResult> {
    let (path, rest) = line.split_once('\0')?;
    let (line_no, text) = rest.split_once(':')?;
    let line_no = line_no.parse::<usize>().ok()?;
    let path = display_path(Path::new(path));
    Some(SearchResult::exact(path, line_no, text.trim_end_matches('\r')))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
