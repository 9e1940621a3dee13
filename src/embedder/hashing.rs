//! Offline feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed into one of `dimensions`
//! buckets with a hash-derived sign, and the bucket counts are L2-normalized.
//! Texts that share words get a positive cosine similarity, which is enough
//! for retrieval without a model server, and results are deterministic.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

pub struct HashingEmbedder {
    pub dimensions: usize,
}

impl HashingEmbedder {
    /// Create a new `HashingEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return Ok(embedding);
        }

        for token in tokens(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::cosine_similarity;

    #[test]
    fn test_embed_dimensions() {
        let embedder = HashingEmbedder::new(384);
        assert_eq!(embedder.embed("hello world").unwrap().len(), 384);
    }

    #[test]
    fn test_embed_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Panthera tigris").unwrap();
        let b = embedder.embed("Panthera tigris").unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Threat: Endangered!").unwrap();
        let b = embedder.embed("threat endangered").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_normalized() {
        let embedder = HashingEmbedder::default();
        let vec = embedder.embed("test normalization of vectors").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "expected unit length, got {norm}");
    }

    #[test]
    fn test_no_tokens_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let vec = embedder.embed("  --- !!! ").unwrap();
        assert!(vec.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("tiger habitat").unwrap();
        let related = embedder.embed("the tiger habitat is shrinking").unwrap();
        let unrelated = embedder.embed("quarterly revenue report").unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_embed_batch() {
        let embedder = HashingEmbedder::new(128);
        let results = embedder.embed_batch(&["a", "b", "c"]).unwrap();
        assert_eq!(results.len(), 3);
        for vec in &results {
            assert_eq!(vec.len(), 128);
        }
    }
}
