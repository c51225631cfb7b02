use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::complexity::violations::check_chunk;
use crate::complexity::{ComplexityThresholds, ComplexityViolation, Severity};
use crate::indexer::chunk::Chunk;
use crate::indexer::chunker::{ChunkOptions, chunk_file};
use crate::indexer::core::IndexError;
use crate::indexer::manifest::normalize_path;
use crate::report::dependents::DependencyIndex;
use crate::report::{ComplexityReport, FileReport, ReportSummary, RiskLevel, SeverityCounts, round1};

/// Turns chunk metadata into a [`ComplexityReport`].
#[derive(Debug, Clone, Default)]
pub struct ComplexityAnalyzer {
    thresholds: ComplexityThresholds,
}

impl ComplexityAnalyzer {
    pub fn new(thresholds: ComplexityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ComplexityThresholds {
        &self.thresholds
    }

    /// Reports on `chunks`, restricted to the `focus` files when given.
    /// Dependents are always resolved against every chunk.
    pub fn analyze(&self, chunks: &[Chunk], focus: Option<&[String]>) -> ComplexityReport {
        let focus: Option<HashSet<&str>> =
            focus.map(|files| files.iter().map(|f| f.trim_start_matches("./")).collect());
        let in_focus = |chunk: &&Chunk| {
            focus
                .as_ref()
                .is_none_or(|set| set.contains(chunk.metadata.file.as_str()))
        };

        let index = DependencyIndex::build(chunks);
        let mut analyzed = BTreeSet::new();
        let mut complexities = Vec::new();
        let mut by_file: BTreeMap<String, Vec<ComplexityViolation>> = BTreeMap::new();

        for chunk in chunks.iter().filter(in_focus) {
            analyzed.insert(chunk.metadata.file.as_str());
            if let (true, Some(value)) = (chunk.is_callable(), chunk.metadata.complexity) {
                complexities.push(value);
            }
            let violations = check_chunk(chunk, &self.thresholds);
            if !violations.is_empty() {
                by_file
                    .entry(chunk.metadata.file.clone())
                    .or_default()
                    .extend(violations);
            }
        }

        let mut summary = ReportSummary {
            files_analyzed: analyzed.len(),
            max_complexity: complexities.iter().copied().max().unwrap_or(0),
            avg_complexity: if complexities.is_empty() {
                0.0
            } else {
                let sum: u64 = complexities.iter().map(|&v| u64::from(v)).sum();
                round1(sum as f64 / complexities.len() as f64)
            },
            ..ReportSummary::default()
        };

        let mut files = BTreeMap::new();
        for (file, mut violations) in by_file {
            violations.sort_by(|a, b| {
                (a.start_line, a.metric_type).cmp(&(b.start_line, b.metric_type))
            });
            let counts = severity_counts(&violations);
            summary.by_severity.error += counts.error;
            summary.by_severity.warning += counts.warning;
            summary.total_violations += violations.len();

            let dependents = index.dependents_of(&file);
            let risk_level = RiskLevel::from_violations(&violations)
                .max(RiskLevel::from_dependents(dependents.len()));
            let dependent_complexity = index.dependent_complexity(&file);
            files.insert(
                file,
                FileReport {
                    violations,
                    risk_level,
                    dependent_count: dependents.len(),
                    dependents,
                    dependent_complexity,
                },
            );
        }

        info!(
            "Analyzed {} files: {} violations ({} errors, {} warnings)",
            summary.files_analyzed,
            summary.total_violations,
            summary.by_severity.error,
            summary.by_severity.warning
        );
        ComplexityReport { summary, files }
    }

    /// Chunks `paths` (absolute or relative to `root`) and reports on them.
    pub fn analyze_files(
        &self,
        root: &Path,
        paths: &[PathBuf],
        options: &ChunkOptions,
    ) -> Result<ComplexityReport, IndexError> {
        let mut chunks = Vec::new();
        let mut focus = Vec::with_capacity(paths.len());
        for path in paths {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            let relative = normalize_path(root, &absolute);
            let content = fs::read_to_string(&absolute).map_err(|source| IndexError::Io {
                path: absolute.clone(),
                source,
            })?;
            chunks.extend(chunk_file(&relative, &content, options)?);
            focus.push(relative);
        }
        Ok(self.analyze(&chunks, Some(&focus)))
    }
}

pub fn severity_counts(violations: &[ComplexityViolation]) -> SeverityCounts {
    violations.iter().fold(SeverityCounts::default(), |mut acc, v| {
        match v.severity {
            Severity::Error => acc.error += 1,
            Severity::Warning => acc.warning += 1,
        }
        acc
    })
}
