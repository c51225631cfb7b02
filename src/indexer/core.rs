use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as TokioMutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::db::{ChunkStore, StoreError};
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::change_detector::{ChangeDetector, ChangeReason, DiscoveredFile};
use crate::indexer::chunk::Chunk;
use crate::indexer::chunker::{ChunkError, ChunkOptions, chunk_file};
use crate::indexer::manifest::{
    Manifest, ManifestEntry, ManifestError, ManifestStore, content_hash, normalize_path,
};
use crate::indexer::vcs::read_vcs_state;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("invalid exclude pattern: {0}")]
    ExcludePattern(#[from] globset::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("indexing task failed: {0}")]
    Task(String),

    #[error("{0} is excluded or has no indexed extension")]
    NotIndexable(String),
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub root: PathBuf,
    /// Holds `manifest.json` and the `version` marker.
    pub index_dir: PathBuf,
    pub chunk: ChunkOptions,
    /// Files chunked in parallel.
    pub concurrency: usize,
    /// Chunks accumulated before an embed + upsert round.
    pub batch_threshold: usize,
    pub exclude_patterns: Vec<String>,
    pub extra_extensions: Vec<String>,
}

impl IndexerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_dir: root.join(".codesift"),
            root,
            chunk: ChunkOptions::default(),
            concurrency: 4,
            batch_threshold: 64,
            exclude_patterns: Vec::new(),
            extra_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    pub success: bool,
    pub reason: ChangeReason,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    pub files_unchanged: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexResult {
    fn new(reason: ChangeReason) -> Self {
        Self {
            success: true,
            reason,
            files_indexed: 0,
            chunks_created: 0,
            files_deleted: 0,
            files_failed: 0,
            files_unchanged: 0,
            duration_ms: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: impl std::fmt::Display) {
        self.success = false;
        if self.error.is_none() {
            self.error = Some(error.to_string());
        }
    }
}

/// Chunks of one file, ready to be batched.
struct PreparedFile {
    chunks: Vec<Chunk>,
    content_hash: String,
}

enum FileOutcome {
    /// Files whose chunks this task's flush wrote.
    Flushed(Vec<(String, ManifestEntry)>),
    /// Chunks wait in the shared batch.
    Queued,
    Failed { path: String, error: String },
    Aborted { error: String },
    Skipped,
}

/// Chunks waiting for the next flush, with the manifest entries of the
/// files they came from.
#[derive(Default)]
struct ChunkBatch {
    chunks: Vec<Chunk>,
    files: Vec<(String, ManifestEntry)>,
}

impl ChunkBatch {
    fn take(&mut self) -> (Vec<Chunk>, Vec<(String, ManifestEntry)>) {
        (std::mem::take(&mut self.chunks), std::mem::take(&mut self.files))
    }
}

/// Runs full and incremental passes over a source tree.
pub struct Indexer<S: ChunkStore + 'static, E: Embedder + ?Sized + 'static> {
    store: Arc<TokioMutex<S>>,
    embedder: Arc<E>,
    options: Arc<IndexerOptions>,
    manifests: ManifestStore,
    /// Held for a whole `index` or `index_file` call; both rewrite the manifest.
    manifest_lock: TokioMutex<()>,
    detector: ChangeDetector,
}

impl<S: ChunkStore + 'static, E: Embedder + ?Sized + 'static> Indexer<S, E> {
    pub fn new(
        store: Arc<TokioMutex<S>>,
        embedder: Arc<E>,
        options: IndexerOptions,
    ) -> Result<Self, IndexError> {
        let detector = ChangeDetector::new(
            options.root.clone(),
            &options.exclude_patterns,
            &options.extra_extensions,
        )?;
        options.chunk.validate()?;
        Ok(Self {
            store,
            embedder,
            manifests: ManifestStore::new(&options.index_dir),
            manifest_lock: TokioMutex::new(()),
            detector,
            options: Arc::new(options),
        })
    }

    pub fn store(&self) -> Arc<TokioMutex<S>> {
        self.store.clone()
    }

    pub fn manifest_store(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Indexes everything that changed since the last successful pass.
    /// `force` ignores the manifest and rebuilds from scratch.
    pub async fn index(&self, force: bool) -> IndexResult {
        let _manifest_guard = self.manifest_lock.lock().await;
        let started = Instant::now();
        let previous = if force {
            None
        } else {
            self.manifests.load_or_none()
        };

        let files = self.detector.discover();
        let changes = self.detector.detect_changes_in(previous.as_ref(), &files);
        let mut result = IndexResult::new(changes.reason);
        result.files_unchanged = files.len() - changes.added.len() - changes.modified.len();

        if changes.reason == ChangeReason::Incremental && changes.is_empty() && changes.touched.is_empty() {
            debug!("Index is up to date");
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        if let Err(e) = self.embedder.initialize() {
            result.fail(e);
            return result;
        }

        let mut manifest = match (changes.reason, previous) {
            (ChangeReason::Incremental, Some(manifest)) => manifest,
            _ => Manifest::default(),
        };

        if changes.reason == ChangeReason::Full {
            info!("Full reindex of {}", self.options.root.display());
            if let Err(e) = self.store.lock().await.clear() {
                result.fail(e);
                result.duration_ms = started.elapsed().as_millis() as u64;
                return result;
            }
        }

        // Removed files
        {
            let mut store = self.store.lock().await;
            for path in &changes.deleted {
                match store.delete_by_file(path) {
                    Ok(removed) => {
                        debug!("Evicted {} chunks of deleted file {}", removed, path);
                        manifest.files.remove(path);
                        result.files_deleted += 1;
                    }
                    Err(e) => {
                        warn!("Failed to evict {}: {}", path, e);
                        result.files_failed += 1;
                    }
                }
            }
        }

        for touched in &changes.touched {
            if let Some(entry) = manifest.files.get_mut(&touched.path) {
                entry.last_modified = touched.last_modified;
            }
        }

        // Stale chunks of files about to be re-chunked
        let by_path: HashMap<&str, &DiscoveredFile> =
            files.iter().map(|f| (f.path.as_str(), f)).collect();
        let mut to_process = Vec::new();
        {
            let mut store = self.store.lock().await;
            for path in changes.to_process() {
                let Some(file) = by_path.get(path.as_str()) else {
                    continue;
                };
                if changes.reason == ChangeReason::Incremental {
                    if let Err(e) = store.delete_by_file(&path) {
                        warn!("Failed to evict stale chunks of {}: {}", path, e);
                        manifest.files.remove(&path);
                        result.files_failed += 1;
                        continue;
                    }
                }
                to_process.push((*file).clone());
            }
        }

        let flushed = Arc::new(AtomicUsize::new(0));
        let abort = Arc::new(AtomicBool::new(false));
        let outcomes = self
            .process_files(to_process, flushed.clone(), abort.clone())
            .await;

        let mut aborted = None;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Flushed(files) => {
                    result.files_indexed += files.len();
                    manifest.files.extend(files);
                }
                FileOutcome::Failed { path, error } => {
                    warn!("Failed to index {}: {}", path, error);
                    manifest.files.remove(&path);
                    result.files_failed += 1;
                }
                FileOutcome::Aborted { error } => {
                    aborted.get_or_insert(error);
                }
                FileOutcome::Queued | FileOutcome::Skipped => {}
            }
        }
        result.chunks_created = flushed.load(Ordering::SeqCst);

        if let Some(error) = aborted {
            error!("Indexing stopped after a failed flush: {}", error);
            result.fail(error);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        manifest.last_indexed = Utc::now();
        manifest.vcs = read_vcs_state(&self.options.root);
        if let Err(e) = self
            .manifests
            .save(&manifest)
            .and_then(|()| self.manifests.write_version_marker())
        {
            error!("Failed to persist manifest: {}", e);
            result.fail(e);
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Indexed {} files ({} chunks), {} deleted, {} failed, {} unchanged in {} ms",
            result.files_indexed,
            result.chunks_created,
            result.files_deleted,
            result.files_failed,
            result.files_unchanged,
            result.duration_ms
        );
        result
    }

    /// Chunks `files` in parallel, flushing the shared batch as it fills.
    async fn process_files(
        &self,
        files: Vec<DiscoveredFile>,
        flushed: Arc<AtomicUsize>,
        abort: Arc<AtomicBool>,
    ) -> Vec<FileOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let batch = Arc::new(TokioMutex::new(ChunkBatch::default()));
        let threshold = self.options.batch_threshold.max(1);
        let mut tasks = JoinSet::new();

        for file in files {
            if abort.load(Ordering::SeqCst) {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let options = self.options.clone();
            let store = self.store.clone();
            let embedder = self.embedder.clone();
            let batch = batch.clone();
            let flushed = flushed.clone();
            let abort = abort.clone();

            tasks.spawn(async move {
                let _permit = permit;
                if abort.load(Ordering::SeqCst) {
                    return FileOutcome::Skipped;
                }
                let path = file.path.clone();
                let absolute = file.absolute.clone();
                let chunk_options = options.chunk.clone();
                let prepared = tokio::task::spawn_blocking(move || {
                    prepare_file(&absolute, &path, &chunk_options)
                })
                .await;

                let prepared = match prepared {
                    Ok(Ok(prepared)) => prepared,
                    Ok(Err(e)) => {
                        return FileOutcome::Failed {
                            path: file.path,
                            error: e.to_string(),
                        };
                    }
                    Err(e) => {
                        return FileOutcome::Failed {
                            path: file.path,
                            error: e.to_string(),
                        };
                    }
                };

                let entry = ManifestEntry {
                    last_modified: file.last_modified,
                    content_hash: prepared.content_hash,
                    chunk_count: prepared.chunks.len(),
                };
                let ready = {
                    let mut guard = batch.lock().await;
                    guard.chunks.extend(prepared.chunks);
                    guard.files.push((file.path, entry));
                    (guard.chunks.len() >= threshold).then(|| guard.take())
                };
                let Some((chunks, files)) = ready else {
                    return FileOutcome::Queued;
                };
                match flush(&store, embedder.as_ref(), chunks).await {
                    Ok(written) => {
                        flushed.fetch_add(written, Ordering::SeqCst);
                        FileOutcome::Flushed(files)
                    }
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        FileOutcome::Aborted {
                            error: e.to_string(),
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(FileOutcome::Aborted {
                    error: IndexError::Task(e.to_string()).to_string(),
                }),
            }
        }

        if !abort.load(Ordering::SeqCst) {
            let (rest, files) = batch.lock().await.take();
            match flush(&self.store, self.embedder.as_ref(), rest).await {
                Ok(written) => {
                    flushed.fetch_add(written, Ordering::SeqCst);
                    outcomes.push(FileOutcome::Flushed(files));
                }
                Err(e) => {
                    abort.store(true, Ordering::SeqCst);
                    outcomes.push(FileOutcome::Aborted {
                        error: e.to_string(),
                    });
                }
            }
        }
        outcomes
    }

    /// Re-indexes a single file and updates its manifest entry. A file that
    /// no longer exists is evicted. Returns the number of chunks written.
    /// Paths a full pass would skip are rejected.
    pub async fn index_file(&self, path: &Path) -> Result<usize, IndexError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.root.join(path)
        };
        let relative = normalize_path(&self.options.root, &absolute);
        if !self.detector.is_indexable(&relative) {
            return Err(IndexError::NotIndexable(relative));
        }

        let _manifest_guard = self.manifest_lock.lock().await;
        let mut manifest = self.manifests.load_or_none().unwrap_or_default();

        if !absolute.exists() {
            let removed = self.store.lock().await.delete_by_file(&relative)?;
            info!("Evicted {} chunks of removed file {}", removed, relative);
            manifest.files.remove(&relative);
            self.manifests.save(&manifest)?;
            return Ok(0);
        }

        let last_modified = fs::metadata(&absolute)
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .map_err(|source| IndexError::Io {
                path: absolute.clone(),
                source,
            })?;

        let chunk_options = self.options.chunk.clone();
        let (task_path, task_relative) = (absolute.clone(), relative.clone());
        let prepared = tokio::task::spawn_blocking(move || {
            prepare_file(&task_path, &task_relative, &chunk_options)
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))??;

        self.store.lock().await.delete_by_file(&relative)?;
        let entry = ManifestEntry {
            last_modified,
            content_hash: prepared.content_hash,
            chunk_count: prepared.chunks.len(),
        };
        let written = flush(&self.store, self.embedder.as_ref(), prepared.chunks).await?;

        manifest.files.insert(relative.clone(), entry);
        manifest.last_indexed = Utc::now();
        self.manifests.save(&manifest)?;
        debug!("Re-indexed {} ({} chunks)", relative, written);
        Ok(written)
    }
}

/// Reads, hashes and chunks one file.
fn prepare_file(absolute: &Path, relative: &str, options: &ChunkOptions) -> Result<PreparedFile, IndexError> {
    let bytes = fs::read(absolute).map_err(|source| IndexError::Io {
        path: absolute.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let chunks = chunk_file(relative, &content, options)?;
    Ok(PreparedFile {
        chunks,
        content_hash: content_hash(&bytes),
    })
}

/// Embeds `chunks` and writes them under the store lock.
async fn flush<S: ChunkStore, E: Embedder + ?Sized>(
    store: &TokioMutex<S>,
    embedder: &E,
    chunks: Vec<Chunk>,
) -> Result<usize, IndexError> {
    if chunks.is_empty() {
        return Ok(0);
    }
    let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = embedder.embed_batch(&refs)?;

    let mut store = store.lock().await;
    let written = store.upsert(&chunks, &vectors)?;
    debug!("Flushed {} chunks", written);
    Ok(written)
}
