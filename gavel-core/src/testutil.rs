//! Deterministic embedders for tests.
//!
//! `MockEmbedder` hashes the input text into a seed and expands it into
//! a pseudo-random vector, so the same text always embeds to the same
//! vector and distinct texts almost surely differ — enough structure
//! for retrieval tests without loading a real model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::embedding::{EmbedError, Embedder};

pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                let mut seed = hasher.finish() | 1;
                (0..self.dimensions)
                    .map(|_| {
                        // xorshift64
                        seed ^= seed << 13;
                        seed ^= seed >> 7;
                        seed ^= seed << 17;
                        (seed as f32 / u64::MAX as f32) * 2.0 - 1.0
                    })
                    .collect()
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

/// Embedder whose every call fails, for error-path tests.
pub struct FailingEmbedder {
    dimensions: usize,
}

impl FailingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::EncodingFailed("mock embedder failure".into()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-failing"
    }
}

/// Embedder that declares one dimensionality but produces another, for
/// health-check tests.
pub struct WrongDimensionEmbedder {
    declared: usize,
    actual: usize,
}

impl WrongDimensionEmbedder {
    pub fn new(declared: usize, actual: usize) -> Self {
        Self { declared, actual }
    }
}

impl Embedder for WrongDimensionEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|_| vec![0.5; self.actual]).collect())
    }

    fn dimensions(&self) -> usize {
        self.declared
    }

    fn model_name(&self) -> &str {
        "mock-wrong-dimension"
    }
}
