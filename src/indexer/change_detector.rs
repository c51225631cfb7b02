//! Decides which files must re-enter the indexing pipeline.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::indexer::manifest::{Manifest, content_hash, normalize_path};
use crate::languages::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeReason {
    Incremental,
    Full,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChangeReason::Incremental => "incremental",
            ChangeReason::Full => "full",
        })
    }
}

/// A file whose mtime moved while its content stayed the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchedFile {
    pub path: String,
    pub last_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub touched: Vec<TouchedFile>,
    pub reason: ChangeReason,
}

impl ChangeSet {
    fn new(reason: ChangeReason) -> Self {
        Self {
            added: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            touched: Vec::new(),
            reason,
        }
    }

    /// Nothing to re-chunk or evict.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Added and modified files, in that order.
    pub fn to_process(&self) -> Vec<String> {
        self.added.iter().chain(&self.modified).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Root-relative, forward slashes.
    pub path: String,
    pub absolute: PathBuf,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

pub struct ChangeDetector {
    root: PathBuf,
    excludes: GlobSet,
    extra_extensions: HashSet<String>,
}

impl ChangeDetector {
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_patterns: &[String],
        extra_extensions: &[String],
    ) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            root: root.into(),
            excludes: builder.build()?,
            extra_extensions: extra_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root-relative path passes the exclude globs and has an
    /// indexed extension.
    pub fn is_indexable(&self, relative: &str) -> bool {
        if self.excludes.is_match(relative) {
            return false;
        }
        let Some(ext) = Path::new(relative).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        registry().supports_extension(&ext) || self.extra_extensions.contains(&ext)
    }

    /// Every indexable file below the root, sorted by path. Honours
    /// `.gitignore` and the exclude globs.
    pub fn discover(&self) -> Vec<DiscoveredFile> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .require_git(false)
            .follow_links(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let relative = normalize_path(&self.root, entry.path());
            if !self.is_indexable(&relative) {
                continue;
            }
            let Some(last_modified) = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            else {
                warn!("Cannot read mtime of {}", relative);
                continue;
            };
            files.push(DiscoveredFile {
                path: relative,
                absolute: entry.path().to_path_buf(),
                last_modified,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Discovered {} indexable files under {}", files.len(), self.root.display());
        files
    }

    /// Compares the working tree against `manifest`.
    pub fn detect_changes(&self, manifest: Option<&Manifest>) -> ChangeSet {
        let files = self.discover();
        self.detect_changes_in(manifest, &files)
    }

    /// Compares an already discovered file list against `manifest`. A
    /// missing or incompatible manifest yields a full change set.
    pub fn detect_changes_in(&self, manifest: Option<&Manifest>, files: &[DiscoveredFile]) -> ChangeSet {
        let Some(manifest) = manifest.filter(|m| m.is_compatible()) else {
            info!("No usable manifest, full reindex of {} files", files.len());
            let mut changes = ChangeSet::new(ChangeReason::Full);
            changes.added = files.iter().map(|f| f.path.clone()).collect();
            return changes;
        };

        let mut changes = ChangeSet::new(ChangeReason::Incremental);
        let mut present = HashSet::with_capacity(files.len());

        for file in files {
            present.insert(file.path.as_str());
            let Some(entry) = manifest.files.get(&file.path) else {
                changes.added.push(file.path.clone());
                continue;
            };
            if entry.last_modified == file.last_modified {
                continue;
            }
            match fs::read(&file.absolute) {
                Ok(bytes) if content_hash(&bytes) == entry.content_hash => {
                    changes.touched.push(TouchedFile {
                        path: file.path.clone(),
                        last_modified: file.last_modified,
                    });
                }
                Ok(_) => changes.modified.push(file.path.clone()),
                Err(e) => {
                    warn!("Cannot hash {}, treating as modified: {}", file.path, e);
                    changes.modified.push(file.path.clone());
                }
            }
        }

        changes.deleted = manifest
            .files
            .keys()
            .filter(|path| !present.contains(path.as_str()))
            .cloned()
            .collect();

        debug!(
            "Changes: {} added, {} modified, {} deleted, {} touched",
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len(),
            changes.touched.len()
        );
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::manifest::{MANIFEST_FORMAT_VERSION, ManifestEntry};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn manifest_of(detector: &ChangeDetector) -> Manifest {
        let mut manifest = Manifest::default();
        for file in detector.discover() {
            let bytes = fs::read(&file.absolute).unwrap();
            manifest.files.insert(
                file.path.clone(),
                ManifestEntry {
                    last_modified: file.last_modified,
                    content_hash: content_hash(&bytes),
                    chunk_count: 1,
                },
            );
        }
        manifest
    }

    fn detector(dir: &TempDir) -> ChangeDetector {
        ChangeDetector::new(dir.path(), &["vendor/**".to_string()], &[]).unwrap()
    }

    #[test]
    fn test_discover_filters_extensions_and_excludes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "export const a = 1;");
        write(dir.path(), "src/b.py", "b = 1");
        write(dir.path(), "README.md", "# readme");
        write(dir.path(), "vendor/lib.go", "package lib");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");

        let paths: Vec<String> = detector(&dir).discover().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["src/a.ts", "src/b.py"]);
    }

    #[test]
    fn test_extra_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.md", "# notes");
        let detector = ChangeDetector::new(dir.path(), &[], &[".md".to_string()]).unwrap();
        assert_eq!(detector.discover().len(), 1);
    }

    #[test]
    fn test_missing_manifest_is_full() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let changes = detector(&dir).detect_changes(None);
        assert_eq!(changes.reason, ChangeReason::Full);
        assert_eq!(changes.added, vec!["a.rs"]);
    }

    #[test]
    fn test_incompatible_manifest_is_full() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let detector = detector(&dir);
        let mut manifest = manifest_of(&detector);
        manifest.format_version = MANIFEST_FORMAT_VERSION + 1;
        assert_eq!(detector.detect_changes(Some(&manifest)).reason, ChangeReason::Full);
    }

    #[test]
    fn test_no_op_rerun_is_empty() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        write(dir.path(), "b.go", "package b");
        let detector = detector(&dir);
        let manifest = manifest_of(&detector);

        let changes = detector.detect_changes(Some(&manifest));
        assert_eq!(changes.reason, ChangeReason::Incremental);
        assert!(changes.is_empty());
        assert!(changes.touched.is_empty());
    }

    #[test]
    fn test_mtime_only_change_is_touched() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let detector = detector(&dir);
        let manifest = manifest_of(&detector);

        let later = SystemTime::now() + Duration::from_secs(120);
        fs::File::options()
            .write(true)
            .open(dir.path().join("a.rs"))
            .unwrap()
            .set_modified(later)
            .unwrap();

        let changes = detector.detect_changes(Some(&manifest));
        assert!(changes.modified.is_empty());
        assert_eq!(changes.touched.len(), 1);
        assert_eq!(changes.touched[0].path, "a.rs");
    }

    #[test]
    fn test_added_modified_deleted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep.py", "x = 1");
        write(dir.path(), "edit.py", "y = 1");
        write(dir.path(), "gone.py", "z = 1");
        let detector = detector(&dir);
        let manifest = manifest_of(&detector);

        write(dir.path(), "edit.py", "y = 2  # changed");
        let later = SystemTime::now() + Duration::from_secs(120);
        fs::File::options()
            .write(true)
            .open(dir.path().join("edit.py"))
            .unwrap()
            .set_modified(later)
            .unwrap();
        fs::remove_file(dir.path().join("gone.py")).unwrap();
        write(dir.path(), "new.py", "w = 1");

        let changes = detector.detect_changes(Some(&manifest));
        assert_eq!(changes.added, vec!["new.py"]);
        assert_eq!(changes.modified, vec!["edit.py"]);
        assert_eq!(changes.deleted, vec!["gone.py"]);
        assert_eq!(changes.to_process(), vec!["new.py", "edit.py"]);
    }

    #[test]
    fn test_bad_exclude_glob() {
        assert!(ChangeDetector::new(".", &["a[".to_string()], &[]).is_err());
    }
}
