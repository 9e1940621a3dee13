use std::sync::Arc;

use tracing::debug;

use super::{RetrievalError, RetrievalIndex, RetrievalResult};
use crate::embedder::{Embedder, cosine_similarity, is_zero_vector};
use crate::text::Chunk;

/// Brute-force cosine index held in memory.
pub struct MemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }
}

impl RetrievalIndex for MemoryIndex {
    fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        self.entries.extend(chunks.iter().cloned().zip(vectors));
        debug!("Memory index holds {} chunks", self.entries.len());
        Ok(())
    }

    fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(text)?;
        if is_zero_vector(&query_vector) {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|(chunk, vector)| (cosine_similarity(&query_vector, vector), chunk))
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| RetrievalResult {
                chunk_text: chunk.text.clone(),
                score,
                chunk_index: chunk.index,
                source_start: chunk.source_start,
                source_end: chunk.source_end,
            })
            .collect())
    }

    fn clear(&mut self) -> Result<(), RetrievalError> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, RetrievalError> {
        Ok(self.entries.len())
    }
}
