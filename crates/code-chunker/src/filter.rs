//! Content checks applied before a file is chunked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes inspected for a NUL when sniffing binary content
pub const BINARY_SNIFF_BYTES: usize = 8192;

/// Leading lines checked for minified content
pub const MINIFIED_SNIFF_LINES: usize = 10;

/// A line longer than this (in chars) marks the file as minified
pub const MINIFIED_LINE_CHARS: usize = 2000;

/// Why a file was left out of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Empty,
    Binary,
    Encoding,
    Minified,
    Large,
    Error,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Binary => "binary",
            Self::Encoding => "encoding",
            Self::Minified => "minified",
            Self::Large => "large",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether raw file bytes are indexable text. Returns the decoded text on success.
pub fn inspect_content(bytes: &[u8]) -> Result<&str, SkipReason> {
    if bytes.is_empty() {
        return Err(SkipReason::Empty);
    }

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return Err(SkipReason::Binary);
    }

    let text = std::str::from_utf8(bytes).map_err(|_| SkipReason::Encoding)?;
    if text.trim().is_empty() {
        return Err(SkipReason::Empty);
    }

    let minified = text
        .lines()
        .take(MINIFIED_SNIFF_LINES)
        .any(|line| line.chars().count() > MINIFIED_LINE_CHARS);
    if minified {
        return Err(SkipReason::Minified);
    }

    Ok(text)
}
