use crate::error::{ChunkerError, Result};
use std::path::Path;

/// Source language of a file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    Kotlin,
    C,
    Cpp,
    Ruby,
    Php,
    Swift,
    Markdown,
    Yaml,
    Json,
    Text,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "go" => Language::Go,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "swift" => Language::Swift,
            "md" | "mdx" => Language::Markdown,
            "yaml" | "yml" => Language::Yaml,
            "json" => Language::Json,
            "txt" => Language::Text,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Json => "json",
            Language::Text => "text",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language is supported for AST parsing
    pub fn supports_ast(self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Tsx
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }

    /// Get typical comment prefixes for this language
    pub fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Language::Rust
            | Language::JavaScript
            | Language::TypeScript
            | Language::Tsx
            | Language::Go
            | Language::Java
            | Language::Kotlin
            | Language::C
            | Language::Cpp
            | Language::Php
            | Language::Swift => &["//", "/*", "*"],
            Language::Python | Language::Ruby | Language::Yaml => &["#"],
            _ => &[],
        }
    }

    /// Lines that belong to the declaration below them: comments, attributes, decorators.
    pub fn is_leading_trivia(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            return false;
        }
        if self.comment_prefixes().iter().any(|p| trimmed.starts_with(p)) {
            return true;
        }
        match self {
            Language::Rust => trimmed.starts_with("#["),
            Language::Python
            | Language::JavaScript
            | Language::TypeScript
            | Language::Tsx => trimmed.starts_with('@'),
            _ => false,
        }
    }
}
