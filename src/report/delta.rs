//! Differences between two reports of the same codebase.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::complexity::{ComplexityViolation, MetricType, Severity};
use crate::report::ComplexityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaStatus {
    New,
    Worsened,
    Improved,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityDelta {
    pub filepath: String,
    pub symbol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    pub metric_type: MetricType,
    pub base_complexity: Option<f64>,
    pub head_complexity: Option<f64>,
    /// `head - base`; the full value for new and deleted entries.
    pub delta: f64,
    pub threshold: f64,
    pub severity: Option<Severity>,
    pub status: DeltaStatus,
}

/// File, enclosing class, symbol and metric.
type Key = (String, Option<String>, String, MetricType);

fn index(report: &ComplexityReport) -> BTreeMap<Key, &ComplexityViolation> {
    report
        .violations()
        .map(|v| {
            let key = (
                v.filepath.clone(),
                v.parent_class.clone(),
                v.symbol_name.clone(),
                v.metric_type,
            );
            (key, v)
        })
        .collect()
}

/// Matches violations by file, enclosing class, symbol and metric. Ordered
/// by that key.
pub fn compute_deltas(base: &ComplexityReport, head: &ComplexityReport) -> Vec<ComplexityDelta> {
    let base = index(base);
    let head = index(head);
    let mut deltas = Vec::new();

    for (key, after) in &head {
        let (status, before, delta) = match base.get(key) {
            None => (DeltaStatus::New, None, after.complexity),
            Some(before) => {
                let delta = after.complexity - before.complexity;
                let status = if delta > 0.0 {
                    DeltaStatus::Worsened
                } else if delta < 0.0 {
                    DeltaStatus::Improved
                } else {
                    DeltaStatus::Unchanged
                };
                (status, Some(before.complexity), delta)
            }
        };
        deltas.push(ComplexityDelta {
            filepath: key.0.clone(),
            symbol_name: key.2.clone(),
            parent_class: key.1.clone(),
            metric_type: key.3,
            base_complexity: before,
            head_complexity: Some(after.complexity),
            delta,
            threshold: after.threshold,
            severity: Some(after.severity),
            status,
        });
    }

    // Violations that disappeared were fixed or their symbol removed.
    for (key, before) in base.iter().filter(|(key, _)| !head.contains_key(*key)) {
        deltas.push(ComplexityDelta {
            filepath: key.0.clone(),
            symbol_name: key.2.clone(),
            parent_class: key.1.clone(),
            metric_type: key.3,
            base_complexity: Some(before.complexity),
            head_complexity: None,
            delta: -before.complexity,
            threshold: before.threshold,
            severity: None,
            status: DeltaStatus::Deleted,
        });
    }

    deltas.sort_by(|a, b| {
        (&a.filepath, &a.parent_class, &a.symbol_name, a.metric_type)
            .cmp(&(&b.filepath, &b.parent_class, &b.symbol_name, b.metric_type))
    });
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::violations::classify;
    use crate::indexer::symbols::SymbolType;
    use crate::report::{FileReport, RiskLevel};

    fn report(entries: &[(&str, &str, f64)]) -> ComplexityReport {
        let mut report = ComplexityReport::default();
        for &(file, symbol, value) in entries {
            let (severity, threshold) = classify(value, 15.0).unwrap();
            report
                .files
                .entry(file.to_string())
                .or_insert_with(|| FileReport {
                    violations: Vec::new(),
                    risk_level: RiskLevel::Low,
                    dependents: Vec::new(),
                    dependent_count: 0,
                    dependent_complexity: None,
                })
                .violations
                .push(ComplexityViolation {
                    filepath: file.into(),
                    start_line: 1,
                    end_line: 10,
                    symbol_name: symbol.into(),
                    parent_class: None,
                    symbol_type: SymbolType::Function,
                    language: "go".into(),
                    metric_type: MetricType::Cyclomatic,
                    complexity: value,
                    threshold,
                    severity,
                    message: String::new(),
                    halstead_details: None,
                });
        }
        report
    }

    #[test]
    fn test_delta_statuses() {
        let base = report(&[("a.go", "grow", 16.0), ("a.go", "shrink", 20.0), ("a.go", "same", 15.0), ("b.go", "gone", 18.0)]);
        let head = report(&[("a.go", "grow", 22.0), ("a.go", "shrink", 17.0), ("a.go", "same", 15.0), ("c.go", "fresh", 31.0)]);

        let deltas = compute_deltas(&base, &head);
        let summary: Vec<(&str, DeltaStatus, f64)> = deltas
            .iter()
            .map(|d| (d.symbol_name.as_str(), d.status, d.delta))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("grow", DeltaStatus::Worsened, 6.0),
                ("same", DeltaStatus::Unchanged, 0.0),
                ("shrink", DeltaStatus::Improved, -3.0),
                ("gone", DeltaStatus::Deleted, -18.0),
                ("fresh", DeltaStatus::New, 31.0),
            ]
        );
        let fresh = deltas.iter().find(|d| d.symbol_name == "fresh").unwrap();
        assert_eq!(fresh.severity, Some(Severity::Error));
        assert_eq!(fresh.base_complexity, None);
    }

    #[test]
    fn test_identical_reports_are_unchanged() {
        let r = report(&[("a.go", "f", 16.0)]);
        let deltas = compute_deltas(&r, &r);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].status, DeltaStatus::Unchanged);
    }

    #[test]
    fn test_same_method_name_in_two_classes() {
        use crate::complexity::ComplexityThresholds;
        use crate::indexer::chunker::ChunkOptions;
        use crate::report::ComplexityAnalyzer;
        use std::path::PathBuf;

        let mut src = String::new();
        for class in ["A", "B"] {
            src.push_str(&format!("class {class} {{\n  run(x: number): number {{\n"));
            for i in 0..15 {
                src.push_str(&format!("    if (x === {i}) {{ return {i}; }}\n"));
            }
            src.push_str("    return -1;\n  }\n}\n\n");
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("runners.ts"), src).unwrap();

        let analyzer = ComplexityAnalyzer::new(ComplexityThresholds {
            cognitive: 1_000.0,
            halstead_effort: 1_000_000.0,
            halstead_bugs: 1_000.0,
            ..ComplexityThresholds::default()
        });
        let head = analyzer
            .analyze_files(dir.path(), &[PathBuf::from("runners.ts")], &ChunkOptions::default())
            .unwrap();
        assert_eq!(head.summary.total_violations, 2);

        let deltas = compute_deltas(&ComplexityReport::default(), &head);
        let classes: Vec<Option<&str>> = deltas.iter().map(|d| d.parent_class.as_deref()).collect();
        assert_eq!(classes, vec![Some("A"), Some("B")]);
        assert!(deltas.iter().all(|d| d.status == DeltaStatus::New && d.symbol_name == "run"));

        let unchanged = compute_deltas(&head, &head);
        assert_eq!(unchanged.len(), 2);
        assert!(unchanged.iter().all(|d| d.status == DeltaStatus::Unchanged));
    }
}
