use anyhow::{bail, Context as AnyhowContext, Result};
use greppy_indexer::{IndexerConfig, DEFAULT_BATCH_SIZE};
use greppy_search::{ExactEngine, WeightedFusion, DEFAULT_KEYWORD_WEIGHT, DEFAULT_VECTOR_WEIGHT, EXACT_ENGINE_ENV};
use greppy_vector_store::paths::CONFIG_FILE_NAME;
use greppy_vector_store::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings from `<data root>/config.toml`, overlaid with `GREPPY_*` variables.
///
/// Command-line flags are applied on top by the commands themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreppyConfig {
    pub embedding: EmbeddingConfig,
    pub index: IndexSettings,
    pub search: SearchSettings,
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub hybrid: bool,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub exact_engine: ExactEngine,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            hybrid: true,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            exact_engine: ExactEngine::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub debounce_secs: f64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { debounce_secs: 5.0 }
    }
}

impl GreppyConfig {
    /// Defaults, then `config.toml` under `data_root` if present, then the environment
    pub fn load(data_root: &Path) -> Result<Self> {
        let mut config = Self::from_file(&data_root.join(CONFIG_FILE_NAME))?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
        }
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        self.embedding.apply_env_with(&lookup)?;
        if let Some(engine) = lookup(EXACT_ENGINE_ENV).filter(|v| !v.trim().is_empty()) {
            self.search.exact_engine = engine.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be at least 1");
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be at least 1");
        }
        let weights = [self.search.vector_weight, self.search.keyword_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("search weights must be non-negative numbers");
        }
        check_debounce(self.watch.debounce_secs)?;
        Ok(())
    }

    pub fn fusion(&self) -> WeightedFusion {
        if self.search.hybrid {
            WeightedFusion::new(self.search.vector_weight, self.search.keyword_weight)
        } else {
            WeightedFusion::disabled()
        }
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            batch_size: self.index.batch_size,
            ..IndexerConfig::default()
        }
    }

    pub fn debounce(&self) -> Result<Duration> {
        check_debounce(self.watch.debounce_secs)
    }
}

/// Longest accepted quiet period before a watcher run
pub const MAX_DEBOUNCE_SECS: f64 = 3600.0;

pub fn check_debounce(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || !(0.0..=MAX_DEBOUNCE_SECS).contains(&secs) {
        bail!("debounce must be between 0 and {MAX_DEBOUNCE_SECS} seconds, got {secs}");
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid debounce {secs}"))
}
