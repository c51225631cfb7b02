//! Chunk storage using SQLite and sqlite-vec
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing::info;

use crate::indexer::chunk::Chunk;

pub mod chunks;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("chunk metadata could not be (de)serialized: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("{chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("vector has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Persistence for chunks and their vectors.
///
/// Chunks are unique per `(file, start_line, end_line)`; upserting the same
/// span replaces the previous row.
pub trait ChunkStore: Send {
    fn initialize(&mut self) -> Result<(), StoreError>;

    /// Stores `chunks[i]` with `vectors[i]`. Returns the number written.
    fn upsert(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize, StoreError>;

    /// Removes every chunk of `file`. Returns the number removed.
    fn delete_by_file(&mut self, file: &str) -> Result<usize, StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;

    /// All stored chunks ordered by file and start line.
    fn scan_all(&self) -> Result<Vec<Chunk>, StoreError>;
}

fn schema_sql(dimensions: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    symbol_name TEXT,
    symbol_type TEXT,
    language TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    UNIQUE(file_id, start_line, end_line),
    FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);
CREATE INDEX IF NOT EXISTS idx_chunks_symbol ON chunks(symbol_name);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
    embedding FLOAT[{dimensions}]
);
"#
    )
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection with sqlite-vec loaded and the chunk schema applied.
pub struct Db {
    pub(crate) conn: Connection,
    dimensions: usize,
}

impl Db {
    /// Open a database at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening chunk store: {}", path.display());
        init_sqlite_vec();
        let mut db = Self {
            conn: Connection::open(path)?,
            dimensions,
        };
        db.initialize()?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let mut db = Self {
            conn: Connection::open_in_memory()?,
            dimensions,
        };
        db.initialize()?;
        Ok(db)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn apply_schema(&self) -> Result<(), StoreError> {
        let vec_version: String = self
            .conn
            .query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(&schema_sql(self.dimensions))?;
        Ok(())
    }
}

/// Serialize a float32 vector into the little-endian blob vec0 expects.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
