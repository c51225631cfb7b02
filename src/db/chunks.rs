use super::{ChunkStore, Db, StoreError, serialize_vector};
use crate::indexer::chunk::{Chunk, ChunkMetadata};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

impl ChunkStore for Db {
    fn initialize(&mut self) -> Result<(), StoreError> {
        self.apply_schema()
    }

    fn upsert(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize, StoreError> {
        if chunks.len() != vectors.len() {
            return Err(StoreError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }

        let tx = self.conn.transaction()?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let meta = &chunk.metadata;
            let file_id: i64 = tx.query_row(
                r#"
                INSERT INTO files (path, indexed_at)
                VALUES (?, CURRENT_TIMESTAMP)
                ON CONFLICT(path) DO UPDATE SET indexed_at = CURRENT_TIMESTAMP
                RETURNING id
                "#,
                params![meta.file],
                |row| row.get(0),
            )?;

            let chunk_id: i64 = tx.query_row(
                r#"
                INSERT INTO chunks (file_id, start_line, end_line, symbol_name, symbol_type, language, content, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(file_id, start_line, end_line) DO UPDATE SET
                    symbol_name = excluded.symbol_name,
                    symbol_type = excluded.symbol_type,
                    language = excluded.language,
                    content = excluded.content,
                    metadata = excluded.metadata
                RETURNING id
                "#,
                params![
                    file_id,
                    meta.start_line as i64,
                    meta.end_line as i64,
                    meta.symbol_name,
                    meta.symbol_type.map(|t| t.as_str()),
                    meta.language,
                    chunk.content,
                    serde_json::to_string(meta)?,
                ],
                |row| row.get(0),
            )?;

            tx.execute("DELETE FROM vec_chunks WHERE rowid = ?", params![chunk_id])?;
            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(vector)],
            )?;
        }
        tx.commit()?;
        debug!("Upserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    fn delete_by_file(&mut self, file: &str) -> Result<usize, StoreError> {
        let file_id: Option<i64> = self
            .conn
            .query_row("SELECT id FROM files WHERE path = ?", params![file], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(file_id) = file_id else {
            return Ok(0);
        };

        let tx = self.conn.transaction()?;
        // vec0 tables do not take part in foreign key cascades.
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE file_id = ?)",
            params![file_id],
        )?;
        let removed = tx.execute("DELETE FROM chunks WHERE file_id = ?", params![file_id])?;
        tx.execute("DELETE FROM files WHERE id = ?", params![file_id])?;
        tx.commit()?;
        Ok(removed)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "DELETE FROM vec_chunks; DELETE FROM chunks; DELETE FROM files;",
        )?;
        Ok(())
    }

    fn scan_all(&self) -> Result<Vec<Chunk>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.content, c.metadata
            FROM chunks c JOIN files f ON f.id = c.file_id
            ORDER BY f.path, c.start_line, c.end_line
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let content: String = row.get(0)?;
            let metadata: String = row.get(1)?;
            Ok((content, metadata))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (content, metadata) = row?;
            let metadata: ChunkMetadata = serde_json::from_str(&metadata)?;
            chunks.push(Chunk { content, metadata });
        }
        Ok(chunks)
    }
}

impl Db {
    /// Number of stored chunks for `file`.
    pub fn count_chunks(&self, file: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM chunks c JOIN files f ON f.id = c.file_id WHERE f.path = ?",
            params![file],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of stored vectors; equals the chunk count when the store is consistent.
    pub fn count_vectors(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM vec_chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
