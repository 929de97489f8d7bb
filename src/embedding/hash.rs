// file: src/embedding/hash.rs
// description: deterministic hashed bag-of-words embedder, used when no
// remote embedding endpoint is configured and throughout the test suite

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Local fallback embedder. Each lowercased word hashes into one of
/// `dimension` buckets; the bucket counts are L2-normalized so cosine
/// similarity behaves like term overlap. Deterministic by construction.
pub struct HashEmbedder {
    dimension: usize,
    version: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            version: format!("hash-bow-{}", dimension),
        }
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Embedding(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];

        for word in text.split_whitespace() {
            let token: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect();
            if token.is_empty() {
                continue;
            }

            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        Ok(vector)
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_sync(text)).collect()
    }
}
