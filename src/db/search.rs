use super::{SqliteIndex, serialize_vector};
use crate::embedder::is_zero_vector;
use crate::retrieval::RetrievalResult;
use rusqlite::{Result, params};

fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RetrievalResult> {
    let distance: f64 = row.get(4)?;

    Ok(RetrievalResult {
        chunk_text: row.get(0)?,
        chunk_index: row.get::<_, i64>(1)? as usize,
        source_start: row.get::<_, i64>(2)? as usize,
        source_end: row.get::<_, i64>(3)? as usize,
        score: (1.0 - distance) as f32,
    })
}

impl SqliteIndex {
    /// Cosine similarity search; ties are broken by insertion order.
    ///
    /// A stored zero vector has no cosine distance and scores 0.
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        // Cosine distance is undefined for a zero vector.
        if top_k == 0 || is_zero_vector(query_vector) {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                c.content,
                c.position,
                c.source_start,
                c.source_end,
                COALESCE(vec_distance_cosine(v.embedding, ?), 1.0) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            ORDER BY distance ASC, c.id ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), top_k as i64],
            map_search_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::embedder::hashing::HashingEmbedder;
    use crate::retrieval::RetrievalIndex;
    use crate::text::Chunk;
    use std::sync::Arc;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            index,
            source_start: index * 100,
            source_end: index * 100 + text.chars().count(),
        }
    }

    #[test]
    fn test_search_nearest_first() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        let chunks = vec![chunk(0, "near"), chunk(1, "far")];
        let vectors = vec![vec![0.1, 0.2, 0.3, 0.0], vec![0.0, 0.0, 0.1, 0.9]];
        db.insert_chunks(&chunks, &vectors).unwrap();

        let results = db.search(&[0.1, 0.2, 0.3, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_text, "near");
        assert!(results[0].score > 0.99);
        assert_eq!(results[1].chunk_text, "far");
        assert_eq!(results[1].source_start, 100);
    }

    #[test]
    fn test_zero_query_vector() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        db.insert_chunks(&[chunk(0, "a")], &[vec![1.0, 0.0, 0.0, 0.0]])
            .unwrap();
        assert!(db.search(&[0.0; 4], 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_stored_vector_scores_zero() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::default())).unwrap();
        db.add_chunks(&[chunk(0, "tigers hunt deer"), chunk(1, "........ ---- ....")])
            .unwrap();

        let results = db.query("tigers", 3).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 1);
        assert!(results[1].score.abs() < 1e-6);
    }

    #[test]
    fn test_query_through_trait() {
        let embedder = Arc::new(HashingEmbedder::default());
        let mut db = SqliteIndex::open_in_memory(embedder.clone()).unwrap();
        assert!(db.query("tiger", 3).unwrap().is_empty(), "empty index");

        db.add_chunks(&[
            chunk(0, "tigers hunt at night"),
            chunk(1, "elephants migrate in herds"),
            chunk(2, "otters live near rivers"),
        ])
        .unwrap();

        let results = db.query("elephants herds", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 1);

        // Same ranking as the in-memory cosine computation.
        let q = embedder.embed("elephants herds").unwrap();
        let c = embedder.embed("elephants migrate in herds").unwrap();
        let expected = crate::embedder::cosine_similarity(&q, &c);
        assert!((results[0].score - expected).abs() < 1e-4);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut db = SqliteIndex::open_in_memory(Arc::new(HashingEmbedder::new(4))).unwrap();
        let v = vec![0.5, 0.5, 0.5, 0.5];
        db.insert_chunks(
            &[chunk(0, "a"), chunk(1, "b"), chunk(2, "c")],
            &[v.clone(), v.clone(), v.clone()],
        )
        .unwrap();

        let order: Vec<usize> = db
            .search(&v, 3)
            .unwrap()
            .iter()
            .map(|r| r.chunk_index)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
