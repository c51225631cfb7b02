//! Embedder trait for turning chunk text into vectors.
pub mod mock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),
}

/// Implementations are shared behind `Arc` across indexing tasks.
pub trait Embedder: Send + Sync {
    /// Load whatever the embedder needs before the first call.
    fn initialize(&self) -> Result<(), EmbedderError> {
        Ok(())
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// One vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    fn dimensions(&self) -> usize;
}
