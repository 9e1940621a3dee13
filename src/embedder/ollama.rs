//! Embedder backed by an Ollama server's `/api/embeddings` endpoint.
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{Embedder, EmbedderError};

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, dimensions: usize, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
        }
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), EmbedderError> {
        if embedding.len() != self.dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        debug!("Embedding {} chars with {}", text.len(), self.model);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "model": self.model, "prompt": text }))
            .send()
            .map_err(|e| EmbedderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EmbedderError::RequestFailed(format!(
                "{} returned status {}",
                self.endpoint,
                resp.status()
            )));
        }

        let body: EmbeddingResponse = resp
            .json()
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;
        self.check_dimensions(&body.embedding)?;

        Ok(body.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
