/// Configuration module for codesift.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::complexity::ComplexityThresholds;
use crate::indexer::chunker::{AstFallback, ChunkOptions};
use crate::indexer::core::IndexerOptions;

pub const DEFAULT_CONFIG_PATH: &str = "codesift.json";

// ── Default value functions ──────────────────────────────────────────

fn default_root() -> String {
    ".".to_string()
}

fn default_index_dir() -> String {
    ".codesift".to_string()
}

fn default_chunk_size() -> usize {
    75
}

fn default_chunk_overlap() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_min_node_chars() -> usize {
    10
}

fn default_concurrency() -> usize {
    4
}

fn default_batch_threshold() -> usize {
    64
}

fn default_exclude_patterns() -> Vec<String> {
    ["node_modules/**", "target/**", "dist/**", "build/**", "vendor/**"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_dimensions() -> usize {
    384
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directory to index.
    #[serde(default = "default_root")]
    pub root: String,

    /// Holds `index.db`, `manifest.json` and `version`. Relative paths are
    /// resolved against `root`.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_true")]
    pub use_ast: bool,

    #[serde(default)]
    pub ast_fallback: AstFallback,

    #[serde(default = "default_min_node_chars")]
    pub min_node_chars: usize,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Extensions indexed line-based in addition to the registered languages.
    #[serde(default)]
    pub extra_extensions: Vec<String>,

    #[serde(default)]
    pub complexity: ComplexityConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ComplexityConfig {
    #[serde(default)]
    pub thresholds: ComplexityThresholds,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            index_dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            use_ast: default_true(),
            ast_fallback: AstFallback::default(),
            min_node_chars: default_min_node_chars(),
            concurrency: default_concurrency(),
            batch_threshold: default_batch_threshold(),
            exclude_patterns: default_exclude_patterns(),
            extra_extensions: Vec::new(),
            complexity: ComplexityConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"codesift.json"`.
    /// If the file does not exist, returns a default config and writes a
    /// template when the default path was used.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.concurrency > 0, "concurrency must be positive");
        anyhow::ensure!(self.batch_threshold > 0, "batch_threshold must be positive");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );

        let t = &self.complexity.thresholds;
        for (name, value) in [
            ("cyclomatic", t.cyclomatic),
            ("cognitive", t.cognitive),
            ("halstead_effort", t.halstead_effort),
            ("halstead_bugs", t.halstead_bugs),
        ] {
            anyhow::ensure!(
                value.is_finite() && value >= 0.0,
                "complexity.thresholds.{name} must be a non-negative number"
            );
        }

        for pattern in &self.exclude_patterns {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {pattern}"))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        let dir = Path::new(&self.index_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root_dir().join(dir)
        }
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.index_dir().join("index.db")
    }

    #[must_use]
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            use_ast: self.use_ast,
            ast_fallback: self.ast_fallback,
            min_node_chars: self.min_node_chars,
        }
    }

    #[must_use]
    pub fn indexer_options(&self) -> IndexerOptions {
        // The index directory never feeds back into the index.
        let mut exclude_patterns = self.exclude_patterns.clone();
        if Path::new(&self.index_dir).is_relative() {
            exclude_patterns.push(format!("{}/**", self.index_dir.trim_end_matches('/')));
        }
        IndexerOptions {
            root: self.root_dir(),
            index_dir: self.index_dir(),
            chunk: self.chunk_options(),
            concurrency: self.concurrency,
            batch_threshold: self.batch_threshold,
            exclude_patterns,
            extra_extensions: self.extra_extensions.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 75);
        assert_eq!(config.chunk_overlap, 10);
        assert!(config.use_ast);
        assert_eq!(config.ast_fallback, AstFallback::LineBased);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.model.dimensions, 384);
        assert_eq!(config.complexity.thresholds.cyclomatic, 15.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"chunk_size": 40, "ast_fallback": "error", "complexity": {"thresholds": {"cyclomatic": 10}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunk_size, 40);
        assert_eq!(config.ast_fallback, AstFallback::Error);
        assert_eq!(config.complexity.thresholds.cyclomatic, 10.0);
        // Other fields should have defaults
        assert_eq!(config.complexity.thresholds.cognitive, 15.0);
        assert_eq!(config.batch_threshold, 64);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: [fn(&mut Config); 6] = [
            |c: &mut Config| c.chunk_size = 0,
            |c: &mut Config| c.chunk_overlap = 75,
            |c: &mut Config| c.concurrency = 0,
            |c: &mut Config| c.batch_threshold = 0,
            |c: &mut Config| c.complexity.thresholds.cognitive = -1.0,
            |c: &mut Config| c.exclude_patterns.push("src/[".into()),
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_missing_and_invalid_files_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let config = Config::load(missing.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
        // Only the default path gets a template.
        assert!(!missing.exists());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ chunk_size: ").unwrap();
        assert_eq!(Config::load(broken.to_str().unwrap()).unwrap(), Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codesift.json");
        let mut config = Config::default();
        config.root = "/srv/repo".into();
        config.extra_extensions = vec!["md".into()];
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_derived_paths_and_options() {
        let mut config = Config::default();
        config.root = "/srv/repo".into();
        assert_eq!(config.db_path(), PathBuf::from("/srv/repo/.codesift/index.db"));

        let options = config.indexer_options();
        assert_eq!(options.index_dir, PathBuf::from("/srv/repo/.codesift"));
        assert!(options.exclude_patterns.contains(&".codesift/**".to_string()));
        assert_eq!(options.chunk.chunk_size, 75);
    }
}
