use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for code chunking behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Chunking strategy to use
    pub strategy: ChunkingStrategy,

    /// Lines per fallback window
    pub window_lines: usize,

    /// Lines shared between consecutive fallback windows
    pub overlap_lines: usize,

    /// Hard cap on lines per chunk; larger syntactic units are split
    pub max_chunk_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Structural,
            window_lines: 50,
            overlap_lines: 3,
            max_chunk_lines: 120,
        }
    }
}

impl ChunkerConfig {
    /// Plain line windows for every language
    pub fn line_windows() -> Self {
        Self {
            strategy: ChunkingStrategy::LineWindow,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.window_lines == 0 {
            return Err(ChunkerError::invalid_config("window_lines must be > 0"));
        }

        if self.overlap_lines >= self.window_lines {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_lines ({}) must be smaller than window_lines ({})",
                self.overlap_lines, self.window_lines
            )));
        }

        if self.max_chunk_lines < self.window_lines {
            return Err(ChunkerError::invalid_config(format!(
                "max_chunk_lines ({}) cannot be smaller than window_lines ({})",
                self.max_chunk_lines, self.window_lines
            )));
        }

        Ok(())
    }
}

/// Strategy for chunking code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkingStrategy {
    /// Syntactic units when a grammar is available, line windows otherwise
    Structural,

    /// Fixed line windows with overlap
    LineWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(ChunkerConfig::default().validate().is_ok());
        assert!(ChunkerConfig::line_windows().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChunkerConfig::default();

        config.window_lines = 0;
        assert!(config.validate().is_err());

        config.window_lines = 10;
        config.overlap_lines = 10;
        assert!(config.validate().is_err());

        config.overlap_lines = 2;
        config.max_chunk_lines = 5;
        assert!(config.validate().is_err());

        config.max_chunk_lines = 40;
        assert!(config.validate().is_ok());
    }
}
