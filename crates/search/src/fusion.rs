use serde::{Deserialize, Serialize};

pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.8;
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.2;

/// Linear blend of cosine similarity and keyword overlap.
///
/// Disabled fusion passes the cosine score through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedFusion {
    pub enabled: bool,
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

impl WeightedFusion {
    pub const fn new(vector_weight: f32, keyword_weight: f32) -> Self {
        Self {
            enabled: true,
            vector_weight,
            keyword_weight,
        }
    }

    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            vector_weight: 1.0,
            keyword_weight: 0.0,
        }
    }

    pub fn combine(&self, cosine: f32, keyword: f32) -> f32 {
        if self.enabled {
            self.vector_weight * cosine + self.keyword_weight * keyword
        } else {
            cosine
        }
    }
}

impl Default for WeightedFusion {
    fn default() -> Self {
        Self::new(DEFAULT_VECTOR_WEIGHT, DEFAULT_KEYWORD_WEIGHT)
    }
}
