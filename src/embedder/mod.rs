//! Embedder trait and shared types for text embedding.
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{EmbeddingConfig, EmbeddingProvider, GenerationConfig};

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` so a single embedder can be
/// shared behind `Arc` by an index and the caller.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in the configuration.
///
/// The Ollama embedder talks to the same server as the generation client.
pub fn from_config(embedding: &EmbeddingConfig, generation: &GenerationConfig) -> Arc<dyn Embedder> {
    match embedding.provider {
        EmbeddingProvider::Hashing => Arc::new(hashing::HashingEmbedder::new(embedding.dimensions)),
        EmbeddingProvider::Ollama => Arc::new(ollama::OllamaEmbedder::new(
            &generation.base_url,
            &embedding.model,
            embedding.dimensions,
            generation.timeout(),
        )),
    }
}

/// Cosine similarity of two vectors; zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Whether a vector has no non-zero component.
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
