use serde::{Deserialize, Serialize};

/// A line-aligned chunk of a source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChunk {
    /// Source file path (relative to the project root)
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Raw text of the covered lines
    pub content: String,

    /// Metadata about this chunk
    pub metadata: ChunkMetadata,
}

impl CodeChunk {
    /// Create a new code chunk
    #[must_use]
    pub const fn new(
        file_path: String,
        start_line: usize,
        end_line: usize,
        content: String,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            file_path,
            start_line,
            end_line,
            content,
            metadata,
        }
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Get estimated token count
    #[must_use]
    pub const fn estimated_tokens(&self) -> usize {
        self.metadata.estimated_tokens
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Text handed to the embedding model: a short header naming the file and symbol,
    /// followed by the raw content.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        let mut text = String::with_capacity(self.content.len() + self.file_path.len() + 32);
        text.push_str(&self.file_path);
        if let Some(label) = self.metadata.label() {
            text.push_str(" :: ");
            text.push_str(label);
        }
        text.push('\n');
        text.push_str(&self.content);
        text
    }
}

/// Metadata about a code chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Programming language
    pub language: Option<String>,

    /// Chunk type (function, class, module, etc.)
    pub chunk_type: Option<ChunkType>,

    /// Symbol name (function name, class name, etc.)
    pub symbol_name: Option<String>,

    /// Parent scope (impl target for methods, class for Python/JS methods)
    pub parent_scope: Option<String>,

    /// Full qualified name (e.g., "Store::save", "Client.connect")
    pub qualified_name: Option<String>,

    /// Estimated token count (rough approximation)
    pub estimated_tokens: usize,
}

impl ChunkMetadata {
    /// Create metadata with language only
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Default::default()
        }
    }

    /// Builder: set chunk type
    #[must_use]
    pub const fn chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = Some(chunk_type);
        self
    }

    /// Builder: set symbol name
    #[must_use]
    pub fn symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = Some(name.into());
        self
    }

    /// Builder: set parent scope
    #[must_use]
    pub fn parent_scope(mut self, scope: impl Into<String>) -> Self {
        self.parent_scope = Some(scope.into());
        self
    }

    /// Builder: set estimated tokens
    #[must_use]
    pub const fn estimated_tokens(mut self, tokens: usize) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    /// Most specific human-readable label for the chunk, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.qualified_name
            .as_deref()
            .or(self.symbol_name.as_deref())
    }

    /// Estimate tokens from content (~4 chars per token for code)
    #[must_use]
    pub fn estimate_tokens_from_content(content: &str) -> usize {
        (content.len() / 4).max(1)
    }
}

/// Type of code chunk based on the syntactic unit it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Standalone function
    Function,
    /// Method inside a class or impl
    Method,
    /// Class definition
    Class,
    /// Struct definition
    Struct,
    /// Enum definition
    Enum,
    /// Interface/Trait definition
    Interface,
    /// Module definition
    Module,
    /// Implementation block
    Impl,
    /// Type alias
    Type,
    /// Constant
    Const,
    /// Static or top-level variable
    Variable,
    /// Macro definition
    Macro,
    /// Code between syntactic units, or a plain line window
    Other,
}

impl ChunkType {
    /// Container units may be split into their members when too large
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::Class | Self::Impl | Self::Interface | Self::Module
        )
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
            Self::Module => "module",
            Self::Impl => "impl",
            Self::Type => "type",
            Self::Const => "const",
            Self::Variable => "variable",
            Self::Macro => "macro",
            Self::Other => "other",
        }
    }
}
