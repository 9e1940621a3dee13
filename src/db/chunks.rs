use super::{SqliteIndex, serialize_vector};
use crate::text::Chunk;
use rusqlite::{Result, params};

impl SqliteIndex {
    /// Inserts chunks and their embeddings in one transaction.
    pub fn insert_chunks(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(rusqlite::Error::InvalidParameterCount(
                embeddings.len(),
                chunks.len(),
            ));
        }

        let tx = self.conn.transaction()?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                "INSERT INTO chunks (position, content, source_start, source_end) VALUES (?, ?, ?, ?)",
                params![
                    chunk.index as i64,
                    chunk.text,
                    chunk.source_start as i64,
                    chunk.source_end as i64
                ],
            )?;
            let chunk_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(embedding)],
            )?;
        }

        tx.commit()
    }

    /// Deletes every chunk and vector.
    pub fn delete_all_chunks(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        // Virtual table rows are not covered by any cascade.
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks)",
            [],
        )?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.commit()
    }

    pub fn count_chunks(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::hashing::HashingEmbedder;
    use std::sync::Arc;

    fn sample(index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            index,
            source_start: index * 10,
            source_end: index * 10 + text.len(),
        }
    }

    #[test]
    fn test_insert_and_count() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        let chunks = vec![sample(0, "a"), sample(1, "b")];
        let vectors = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]];
        db.insert_chunks(&chunks, &vectors).unwrap();
        assert_eq!(db.count_chunks().unwrap(), 2);

        let vec_rows: i64 = db
            .conn
            .query_row("SELECT count(*) FROM vec_chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(vec_rows, 2);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        let err = db.insert_chunks(&[sample(0, "a")], &[]);
        assert!(err.is_err());
        assert_eq!(db.count_chunks().unwrap(), 0);
    }

    #[test]
    fn test_delete_all() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        db.insert_chunks(&[sample(0, "a")], &[vec![0.5, 0.5, 0.5, 0.5]])
            .unwrap();
        db.delete_all_chunks().unwrap();
        assert_eq!(db.count_chunks().unwrap(), 0);

        let vec_rows: i64 = db
            .conn
            .query_row("SELECT count(*) FROM vec_chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(vec_rows, 0);
    }
}
