//! On-disk record of what the last indexing pass saw.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::indexer::vcs::VcsState;

/// Bumped whenever the manifest layout changes; an older manifest forces a
/// full reindex.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

pub const INDEXER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Lowercase hex SHA-256 of the file content.
    pub content_hash: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub indexer_version: String,
    pub last_indexed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsState>,
    #[serde(default)]
    pub files: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            indexer_version: INDEXER_VERSION.to_string(),
            last_indexed: Utc::now(),
            vcs: None,
            files: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn is_compatible(&self) -> bool {
        self.format_version == MANIFEST_FORMAT_VERSION
    }
}

/// Reads and writes `manifest.json` and the `version` marker inside the
/// index directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    version_path: PathBuf,
}

impl ManifestStore {
    pub fn new(index_dir: impl AsRef<Path>) -> Self {
        let dir = index_dir.as_ref();
        Self {
            path: dir.join("manifest.json"),
            version_path: dir.join("version"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no manifest has been written yet.
    pub fn load(&self) -> Result<Option<Manifest>, ManifestError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Like [`load`](Self::load) but treats an unreadable manifest as absent.
    pub fn load_or_none(&self) -> Option<Manifest> {
        match self.load() {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Ignoring unreadable manifest {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Writes through a temporary file and renames it into place.
    pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(manifest)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| ManifestError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            "Saved manifest with {} files to {}",
            manifest.files.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn write_version_marker(&self) -> Result<(), ManifestError> {
        let stamp = format!("{}\n{}\n", INDEXER_VERSION, Utc::now().timestamp_millis());
        fs::write(&self.version_path, stamp).map_err(|source| ManifestError::Io {
            path: self.version_path.clone(),
            source,
        })
    }

    /// Millisecond timestamp of the last successful pass, if any.
    pub fn read_version_marker(&self) -> Option<i64> {
        let content = fs::read_to_string(&self.version_path).ok()?;
        content.lines().nth(1)?.trim().parse().ok()
    }

    /// Removes the manifest and version marker.
    pub fn clear(&self) -> Result<(), ManifestError> {
        for path in [&self.path, &self.version_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ManifestError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Calculate SHA-256 of file content as lowercase hex.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Root-relative path with forward slashes, used as the manifest key and as
/// the chunk `file` field.
pub fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let text = relative.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}
