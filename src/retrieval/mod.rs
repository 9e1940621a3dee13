//! Retrieval index contract and backends.
//!
//! The pipeline only relies on what [`RetrievalIndex`] promises: identical
//! inputs give identical, stably ranked results, at most `top_k` of them,
//! best first, and an empty index answers every query with an empty list.
pub mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{IndexBackend, IndexConfig};
use crate::db::SqliteIndex;
use crate::embedder::{Embedder, EmbedderError};
use crate::text::Chunk;

pub use memory::MemoryIndex;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("vector store error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A chunk returned for a query, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk_text: String,
    pub score: f32,
    pub chunk_index: usize,
    pub source_start: usize,
    pub source_end: usize,
}

pub trait RetrievalIndex {
    /// Embed and store chunks.
    fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError>;

    /// Return at most `top_k` chunks, ordered by descending similarity.
    fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievalResult>, RetrievalError>;

    /// Remove every stored chunk.
    fn clear(&mut self) -> Result<(), RetrievalError>;

    /// Number of stored chunks.
    fn len(&self) -> Result<usize, RetrievalError>;

    fn is_empty(&self) -> Result<bool, RetrievalError> {
        Ok(self.len()? == 0)
    }
}

/// Open the index backend selected in the configuration.
pub fn open_index(
    config: &IndexConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<Box<dyn RetrievalIndex>, RetrievalError> {
    match config.backend {
        IndexBackend::Memory => Ok(Box::new(MemoryIndex::new(embedder))),
        IndexBackend::Sqlite => {
            let index = if config.db_path == ":memory:" {
                SqliteIndex::open_in_memory(embedder)?
            } else {
                SqliteIndex::open(&config.db_path, embedder)?
            };
            Ok(Box::new(index))
        }
    }
}

/// Concatenate retrieved chunk texts into a prompt context, best first.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::hashing::HashingEmbedder;

    fn result(text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_text: text.to_string(),
            score,
            chunk_index: 0,
            source_start: 0,
            source_end: text.chars().count(),
        }
    }

    #[test]
    fn test_build_context() {
        let ctx = build_context(&[result("first", 0.9), result("second", 0.5)]);
        assert_eq!(ctx, "first\n\nsecond");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_backends_agree_on_tokenless_chunks() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let chunks: Vec<Chunk> = ["........ ---- ....", "Bengal tiger", "Contents 4"]
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                text: t.to_string(),
                index: i,
                source_start: i * 20,
                source_end: i * 20 + t.chars().count(),
            })
            .collect();

        let sqlite_config = IndexConfig {
            backend: IndexBackend::Sqlite,
            db_path: ":memory:".to_string(),
        };
        let mut memory = open_index(&IndexConfig::default(), embedder.clone()).unwrap();
        let mut sqlite = open_index(&sqlite_config, embedder).unwrap();
        memory.add_chunks(&chunks).unwrap();
        sqlite.add_chunks(&chunks).unwrap();

        let from_memory = memory.query("bengal tiger", 3).unwrap();
        let from_sqlite = sqlite.query("bengal tiger", 3).unwrap();
        let order = |r: &[RetrievalResult]| r.iter().map(|r| r.chunk_index).collect::<Vec<_>>();
        assert_eq!(order(&from_memory)[0], 1);
        assert_eq!(order(&from_sqlite), order(&from_memory));
        for (a, b) in from_memory.iter().zip(&from_sqlite) {
            assert!((a.score - b.score).abs() < 1e-4);
        }
    }

    #[test]
    fn test_open_index_backends() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));

        let memory = open_index(&IndexConfig::default(), embedder.clone()).unwrap();
        assert!(memory.is_empty().unwrap());

        let sqlite_config = IndexConfig {
            backend: IndexBackend::Sqlite,
            db_path: ":memory:".to_string(),
        };
        let sqlite = open_index(&sqlite_config, embedder).unwrap();
        assert!(sqlite.is_empty().unwrap());
    }
}
