use serde::{Deserialize, Serialize};

use crate::indexer::chunk::{Chunk, HalsteadSummary};
use crate::indexer::symbols::SymbolType;

// ── Default value functions ──────────────────────────────────────────

fn default_cyclomatic() -> f64 {
    15.0
}

fn default_cognitive() -> f64 {
    15.0
}

fn default_halstead_effort() -> f64 {
    60.0
}

fn default_halstead_bugs() -> f64 {
    1.5
}

/// Warning thresholds; twice the value is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityThresholds {
    #[serde(default = "default_cyclomatic")]
    pub cyclomatic: f64,
    #[serde(default = "default_cognitive")]
    pub cognitive: f64,
    /// Minutes of estimated implementation time.
    #[serde(default = "default_halstead_effort")]
    pub halstead_effort: f64,
    #[serde(default = "default_halstead_bugs")]
    pub halstead_bugs: f64,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            cyclomatic: default_cyclomatic(),
            cognitive: default_cognitive(),
            halstead_effort: default_halstead_effort(),
            halstead_bugs: default_halstead_bugs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Cyclomatic,
    Cognitive,
    HalsteadEffort,
    HalsteadBugs,
}

impl MetricType {
    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Cyclomatic => "Cyclomatic complexity",
            MetricType::Cognitive => "Cognitive complexity",
            MetricType::HalsteadEffort => "Halstead effort (minutes)",
            MetricType::HalsteadBugs => "Halstead estimated bugs",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MetricType::Cyclomatic => "cyclomatic",
            MetricType::Cognitive => "cognitive",
            MetricType::HalsteadEffort => "halstead_effort",
            MetricType::HalsteadBugs => "halstead_bugs",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityViolation {
    pub filepath: String,
    pub start_line: usize,
    pub end_line: usize,
    pub symbol_name: String,
    /// Enclosing class of a method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    pub symbol_type: SymbolType,
    pub language: String,
    pub metric_type: MetricType,
    pub complexity: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halstead_details: Option<HalsteadSummary>,
}

/// Classifies `value` against a warning threshold. Returns the severity and
/// the threshold that was crossed (doubled for errors).
pub fn classify(value: f64, threshold: f64) -> Option<(Severity, f64)> {
    if !value.is_finite() || !threshold.is_finite() || threshold <= 0.0 {
        return None;
    }
    let error_threshold = threshold * 2.0;
    if value >= error_threshold {
        Some((Severity::Error, error_threshold))
    } else if value >= threshold {
        Some((Severity::Warning, threshold))
    } else {
        None
    }
}

/// Halstead effort expressed as minutes of implementation time.
pub fn effort_to_minutes(effort: f64) -> f64 {
    effort / 18.0 / 60.0
}

/// Threshold violations of one function or method chunk.
pub fn check_chunk(chunk: &Chunk, thresholds: &ComplexityThresholds) -> Vec<ComplexityViolation> {
    let meta = &chunk.metadata;
    let Some(symbol_type) = meta.symbol_type.filter(SymbolType::is_callable) else {
        return Vec::new();
    };
    let symbol_name = meta.symbol_name.clone().unwrap_or_else(|| "anonymous".to_string());

    let mut measured: Vec<(MetricType, f64, f64)> = Vec::new();
    if let Some(cyclomatic) = meta.complexity {
        measured.push((MetricType::Cyclomatic, f64::from(cyclomatic), thresholds.cyclomatic));
    }
    if let Some(cognitive) = meta.cognitive_complexity {
        measured.push((MetricType::Cognitive, f64::from(cognitive), thresholds.cognitive));
    }
    if let Some(halstead) = &meta.halstead {
        measured.push((
            MetricType::HalsteadEffort,
            effort_to_minutes(halstead.effort),
            thresholds.halstead_effort,
        ));
        measured.push((MetricType::HalsteadBugs, halstead.bugs, thresholds.halstead_bugs));
    }

    measured
        .into_iter()
        .filter_map(|(metric_type, value, base)| {
            let (severity, threshold) = classify(value, base)?;
            let halstead_details = matches!(
                metric_type,
                MetricType::HalsteadEffort | MetricType::HalsteadBugs
            )
            .then(|| meta.halstead)
            .flatten();
            Some(ComplexityViolation {
                filepath: meta.file.clone(),
                start_line: meta.start_line,
                end_line: meta.end_line,
                symbol_name: symbol_name.clone(),
                parent_class: meta.parent_class.clone(),
                symbol_type,
                language: meta.language.clone(),
                metric_type,
                complexity: round2(value),
                threshold,
                severity,
                message: format!(
                    "{} {} reaches {} threshold {}",
                    metric_type.label(),
                    round2(value),
                    match severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                    },
                    threshold
                ),
                halstead_details,
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::chunk::{ChunkMetadata, ChunkType};

    fn function_chunk(cyclomatic: u32, cognitive: u32) -> Chunk {
        let mut meta = ChunkMetadata::new("src/a.ts", 1, 20, ChunkType::Function, "typescript");
        meta.symbol_name = Some("run".into());
        meta.symbol_type = Some(SymbolType::Function);
        meta.complexity = Some(cyclomatic);
        meta.cognitive_complexity = Some(cognitive);
        Chunk {
            content: String::new(),
            metadata: meta,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(14.0, 15.0), None);
        assert_eq!(classify(15.0, 15.0), Some((Severity::Warning, 15.0)));
        assert_eq!(classify(29.9, 15.0), Some((Severity::Warning, 15.0)));
        assert_eq!(classify(30.0, 15.0), Some((Severity::Error, 30.0)));
        assert_eq!(classify(f64::NAN, 15.0), None);
        assert_eq!(classify(3.0, 0.0), None);
    }

    #[test]
    fn test_check_chunk_at_one_and_two_times() {
        let thresholds = ComplexityThresholds::default();
        let violations = check_chunk(&function_chunk(15, 30), &thresholds);
        assert_eq!(violations.len(), 2);

        let cyclomatic = &violations[0];
        assert_eq!(cyclomatic.metric_type, MetricType::Cyclomatic);
        assert_eq!(cyclomatic.severity, Severity::Warning);
        assert_eq!(cyclomatic.threshold, 15.0);

        let cognitive = &violations[1];
        assert_eq!(cognitive.metric_type, MetricType::Cognitive);
        assert_eq!(cognitive.severity, Severity::Error);
        assert_eq!(cognitive.threshold, 30.0);
    }

    #[test]
    fn test_below_threshold_is_clean() {
        let violations = check_chunk(&function_chunk(14, 3), &ComplexityThresholds::default());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_halstead_effort_in_minutes() {
        let mut chunk = function_chunk(1, 0);
        // 64_800 effort = 3600 s = 60 minutes
        chunk.metadata.halstead = Some(HalsteadSummary {
            volume: 100.0,
            difficulty: 648.0,
            effort: 64_800.0,
            bugs: 0.03,
        });
        let violations = check_chunk(&chunk, &ComplexityThresholds::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].metric_type, MetricType::HalsteadEffort);
        assert_eq!(violations[0].complexity, 60.0);
        assert_eq!(violations[0].severity, Severity::Warning);
        assert!(violations[0].halstead_details.is_some());
    }

    #[test]
    fn test_class_chunks_are_not_checked() {
        let mut chunk = function_chunk(40, 40);
        chunk.metadata.symbol_type = Some(SymbolType::Class);
        assert!(check_chunk(&chunk, &ComplexityThresholds::default()).is_empty());
    }

    #[test]
    fn test_metric_type_serializes_snake_case() {
        let json = serde_json::to_string(&MetricType::HalsteadEffort).unwrap();
        assert_eq!(json, "\"halstead_effort\"");
    }
}
