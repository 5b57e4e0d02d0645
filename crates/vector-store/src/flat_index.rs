use crate::embeddings::cosine_similarity;
use crate::error::{Result, VectorStoreError};
use std::cmp::Ordering;

/// Brute-force cosine index over borrowed vectors
pub struct FlatIndex<'a> {
    dimension: usize,
    vectors: Vec<(&'a str, &'a [f32])>,
}

impl<'a> FlatIndex<'a> {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Add vector to index
    pub fn add(&mut self, id: &'a str, vector: &'a [f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.push((id, vector));
        Ok(())
    }

    /// Search for k nearest neighbors using cosine similarity.
    /// Returns (id, score) sorted by score descending, ties by id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scores: Vec<(&str, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (*id, cosine_similarity(query, vector)))
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        scores.truncate(k);

        Ok(scores
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
