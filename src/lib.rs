//! # codesift: multi-language static-analysis core
//!
//! Parses source files with Tree-sitter, slices them into symbol-level
//! chunks, measures the complexity of every function and keeps an
//! incremental index of what changed between passes.
//!
//! ## Architecture
//!
//! - **[`languages`]**: Language registry and per-language extraction strategies
//! - **[`indexer`]**: Traversal, chunking, change detection and the incremental indexer
//! - **[`complexity`]**: Cyclomatic, cognitive and Halstead metrics plus threshold checks
//! - **[`report`]**: Complexity reports with dependents, risk levels and deltas
//! - **[`db`]**: SQLite + sqlite-vec chunk store
//! - **[`embedder`]**: Embedder trait and a deterministic mock
//! - **[`config`]**: Configuration loading and validation

pub mod complexity;
pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod languages;
pub mod report;
