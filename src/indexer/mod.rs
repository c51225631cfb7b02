pub mod change_detector;
pub mod chunk;
pub mod chunker;
pub mod core;
pub mod heuristics;
pub mod manifest;
pub mod parser;
pub mod symbols;
pub mod traversal;
pub mod vcs;

pub use change_detector::{ChangeDetector, ChangeReason, ChangeSet};
pub use chunk::{Chunk, ChunkMetadata, ChunkType};
pub use chunker::{AstFallback, ChunkError, ChunkOptions, chunk_file};
pub use core::{IndexError, IndexResult, Indexer, IndexerOptions};
