use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Texts are cut to this many chars before embedding
pub const MAX_TEXT_CHARS: usize = 24_000;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_DIMENSION: usize = 768;
pub const STUB_MODEL_ID: &str = "stub";

/// Turns text into fixed-length vectors.
///
/// Implementations must return `dimension()`-long vectors for every input and embed each
/// text independently, so a batch call and single calls agree.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::embedding_unavailable("Empty embedding result"))
    }

    /// Cheap availability probe, run before a batch of work is started.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    Ollama,
    Stub,
}

impl FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::Other(format!(
                "Unsupported GREPPY_EMBEDDING_MODE '{other}' (expected 'ollama' or 'stub')"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub model: String,
    pub dimension: usize,
    pub url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Ollama,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Overlay `GREPPY_EMBEDDING_*` and `GREPPY_OLLAMA_URL` values returned by `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mode) = lookup("GREPPY_EMBEDDING_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(model) = lookup("GREPPY_EMBEDDING_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(dim) = lookup("GREPPY_EMBEDDING_DIM") {
            self.dimension = dim.trim().parse().map_err(|_| {
                VectorStoreError::Other(format!("GREPPY_EMBEDDING_DIM must be a positive integer, got '{dim}'"))
            })?;
        }
        if let Some(url) = lookup("GREPPY_OLLAMA_URL").filter(|u| !u.trim().is_empty()) {
            self.url = url.trim().trim_end_matches('/').to_string();
        }
        Ok(())
    }

    /// Model id recorded in the index for this configuration
    #[must_use]
    pub fn model_id(&self) -> &str {
        match self.mode {
            EmbeddingMode::Ollama => &self.model,
            EmbeddingMode::Stub => STUB_MODEL_ID,
        }
    }
}

pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if config.dimension == 0 {
        return Err(VectorStoreError::Other("embedding dimension must be > 0".into()));
    }
    match config.mode {
        EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(config.dimension))),
        EmbeddingMode::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
    }
}

/// Cut `text` to at most `MAX_TEXT_CHARS` chars without splitting a char.
#[must_use]
pub fn truncate_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn ensure_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(VectorStoreError::InvalidDimension {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============ Stub backend ============

/// Deterministic offline embedder: a signed, hashed bag of lower-cased identifier parts.
/// Texts sharing words land close together, which is enough for tests and offline runs.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        stub_embed(truncate_text(text), self.dimension)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_id(&self) -> &str {
        STUB_MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimension];
    let mut any = false;
    for token in stub_tokens(text) {
        let mut state = fnv1a_64(token.as_bytes());
        let bits = splitmix64(&mut state);
        let bucket = (bits % dimension as u64) as usize;
        let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
        any = true;
    }

    if !any {
        // No word characters: fall back to a pseudo-random unit vector keyed on the bytes.
        let mut state =
            fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        for value in &mut vec {
            let bits = splitmix64(&mut state);
            let high = (bits >> 32) as u32;
            let mantissa = high >> 9;
            let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
            *value = unit.mul_add(2.0, -1.0);
        }
    }

    normalize(&mut vec);
    vec
}

/// Lower-cased words, with camelCase and snake_case identifiers split into their parts.
fn stub_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .flat_map(|word| {
            let mut parts = Vec::new();
            let mut current = String::new();
            let mut prev_lower = false;
            for ch in word.chars() {
                if ch.is_uppercase() && prev_lower && !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
                current.extend(ch.to_lowercase());
            }
            if !current.is_empty() {
                parts.push(current);
            }
            parts
        })
        .filter(|token| token.chars().count() > 1)
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ============ Ollama backend ============

/// Embedding provider backed by a local Ollama instance.
///
/// Calls `POST /api/embed`; 429, 5xx and connection failures are retried with exponential
/// backoff, other 4xx responses fail immediately.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    max_retries: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| VectorStoreError::embedding_unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries,
        })
    }

    fn model_matches(&self, name: &str) -> bool {
        name == self.model
            || name
                .strip_prefix(self.model.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let input: Vec<&str> = texts.iter().map(|t| truncate_text(t)).collect();
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });
        let endpoint = format!("{}/api/embed", self.url);

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                log::debug!("Retrying Ollama embed in {delay:?} (attempt {attempt})");
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&endpoint).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_err = Some(format!(
                        "cannot reach Ollama at {} (is it running?): {e}",
                        self.url
                    ));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: EmbedResponse = response.json().await.map_err(|e| {
                    VectorStoreError::embedding_unavailable(format!("invalid Ollama response: {e}"))
                })?;
                if parsed.embeddings.len() != texts.len() {
                    return Err(VectorStoreError::embedding_unavailable(format!(
                        "Ollama returned {} embeddings for {} inputs",
                        parsed.embeddings.len(),
                        texts.len()
                    )));
                }
                ensure_dimensions(&parsed.embeddings, self.dimension)?;
                return Ok(parsed.embeddings);
            }

            let body_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                last_err = Some(format!("Ollama API error {status}: {body_text}"));
                continue;
            }
            if status.as_u16() == 404 {
                return Err(VectorStoreError::embedding_unavailable(format!(
                    "model '{}' is not available (try `ollama pull {}`)",
                    self.model, self.model
                )));
            }
            return Err(VectorStoreError::embedding_unavailable(format!(
                "Ollama API error {status}: {body_text}"
            )));
        }

        Err(VectorStoreError::embedding_unavailable(
            last_err.unwrap_or_else(|| "Ollama embedding failed after retries".to_string()),
        ))
    }

    async fn ensure_ready(&self) -> Result<()> {
        let endpoint = format!("{}/api/tags", self.url);
        let response = self.client.get(&endpoint).send().await.map_err(|e| {
            VectorStoreError::embedding_unavailable(format!(
                "cannot reach Ollama at {} (is it running?): {e}",
                self.url
            ))
        })?;
        if !response.status().is_success() {
            return Err(VectorStoreError::embedding_unavailable(format!(
                "Ollama readiness probe failed: {}",
                response.status()
            )));
        }
        let tags: TagsResponse = response.json().await.map_err(|e| {
            VectorStoreError::embedding_unavailable(format!("invalid Ollama response: {e}"))
        })?;
        if tags.models.iter().any(|m| self.model_matches(&m.name)) {
            Ok(())
        } else {
            Err(VectorStoreError::embedding_unavailable(format!(
                "model '{}' is not pulled (try `ollama pull {}`)",
                self.model, self.model
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &c), 0.0);
    }

    #[tokio::test]
    async fn stub_batch_matches_single_calls() {
        let stub = StubEmbedder::new(64);
        let texts = vec!["hello world".to_string(), "fooBar baz".to_string()];
        let batch = stub.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], stub.embed("hello world").await.unwrap());
        assert_eq!(batch[1], stub.embed("fooBar baz").await.unwrap());
        assert!(batch.iter().all(|v| v.len() == 64));
    }

    #[test]
    fn stub_vectors_reflect_shared_words() {
        let stub = StubEmbedder::new(256);
        let auth = stub.embed_text("function validateUser(token) { checkToken(token) }");
        let query = stub.embed_text("validate user token");
        let logging = stub.embed_text("console.log('request finished')");
        assert!(cosine_similarity(&auth, &query) > cosine_similarity(&logging, &query));
    }

    #[test]
    fn stub_handles_symbol_only_text() {
        let stub = StubEmbedder::new(16);
        let v = stub.embed_text("{ } ;");
        assert_eq!(v.len(), 16);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(MAX_TEXT_CHARS + 10);
        let cut = truncate_text(&text);
        assert_eq!(cut.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(truncate_text("short"), "short");
    }

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("GREPPY_EMBEDDING_MODE", "stub"),
            ("GREPPY_EMBEDDING_DIM", "32"),
            ("GREPPY_OLLAMA_URL", "http://gpu-box:11434/"),
        ]
        .into_iter()
        .collect();

        let mut config = EmbeddingConfig::default();
        config
            .apply_env_with(|key| vars.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.mode, EmbeddingMode::Stub);
        assert_eq!(config.dimension, 32);
        assert_eq!(config.url, "http://gpu-box:11434");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.model_id(), STUB_MODEL_ID);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = EmbeddingConfig::default();
        assert!(config
            .apply_env_with(|key| (key == "GREPPY_EMBEDDING_MODE").then(|| "gpu".to_string()))
            .is_err());
        assert!(config
            .apply_env_with(|key| (key == "GREPPY_EMBEDDING_DIM").then(|| "wide".to_string()))
            .is_err());
    }

    #[tokio::test]
    async fn unreachable_ollama_is_embedding_unavailable() {
        let config = EmbeddingConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            max_retries: 0,
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();

        let err = embedder.embed_batch(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::EmbeddingUnavailable(_)), "{err}");
        let err = embedder.ensure_ready().await.unwrap_err();
        assert!(matches!(err, VectorStoreError::EmbeddingUnavailable(_)), "{err}");
    }

    #[test]
    fn tag_names_match_with_or_without_version() {
        let embedder = OllamaEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.model_matches("nomic-embed-text"));
        assert!(embedder.model_matches("nomic-embed-text:latest"));
        assert!(!embedder.model_matches("nomic-embed-text-v2"));
    }
}
