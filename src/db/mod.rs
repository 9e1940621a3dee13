//! Retrieval index persisted in SQLite with the sqlite-vec extension.
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{Arc, Once};
use tracing::info;

use crate::embedder::Embedder;
use crate::retrieval::{RetrievalError, RetrievalIndex, RetrievalResult};
use crate::text::Chunk;

pub mod chunks;
pub mod search;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    source_start INTEGER NOT NULL,
    source_end INTEGER NOT NULL,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_chunk_position ON chunks(position);
"#;

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Chunk store with a `vec0` table sized to the embedder's dimensions.
pub struct SqliteIndex {
    pub(crate) conn: Connection,
    pub(crate) embedder: Arc<dyn Embedder>,
}

impl SqliteIndex {
    /// Open a database at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing vector store: {}", path.display());

        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::init(conn, embedder)
    }

    /// Open an in-memory database (the default for a single session).
    pub fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, embedder)
    }

    fn init(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(embedding FLOAT[{}]);",
            embedder.dimensions()
        ))?;

        Ok(Self { conn, embedder })
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

impl RetrievalIndex for SqliteIndex {
    fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        self.insert_chunks(chunks, &vectors)?;
        Ok(())
    }

    fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if top_k == 0 || self.count_chunks()? == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(text)?;
        Ok(self.search(&query_vector, top_k)?)
    }

    fn clear(&mut self) -> Result<(), RetrievalError> {
        Ok(self.delete_all_chunks()?)
    }

    fn len(&self) -> Result<usize, RetrievalError> {
        Ok(self.count_chunks()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::hashing::HashingEmbedder;

    #[test]
    fn test_db_init() {
        let index = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(8)))
            .expect("Failed to open in-memory DB");

        let tables: i64 = index
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('chunks', 'vec_chunks');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_open_file_reuses_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(8));

        {
            let mut index = SqliteIndex::open(&path, embedder.clone()).unwrap();
            let chunk = Chunk {
                text: "persisted chunk".into(),
                index: 0,
                source_start: 0,
                source_end: 15,
            };
            index.add_chunks(&[chunk]).unwrap();
        }

        let index = SqliteIndex::open(&path, embedder).unwrap();
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }
}
