use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Nothing but whitespace; callers record this as a skip, not a failure
    #[error("Empty content provided")]
    EmptyContent,

    #[error("No grammar for language '{0}'")]
    UnsupportedLanguage(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    /// The grammar could not be loaded into a tree-sitter parser
    #[error("Grammar setup failed: {0}")]
    Grammar(String),

    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),
}

impl ChunkerError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::Grammar(msg.into())
    }

    /// Errors that mean "index nothing for this file" rather than a broken chunker
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::EmptyContent)
    }
}
