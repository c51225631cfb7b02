//! Complexity reports built from stored or freshly chunked code.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::complexity::{ComplexityViolation, Severity};

pub mod analyzer;
pub mod delta;
pub mod dependents;

pub use analyzer::ComplexityAnalyzer;
pub use delta::{ComplexityDelta, DeltaStatus, compute_deltas};
pub use dependents::{DependencyIndex, resolve_import};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Risk from the violations of one file.
    pub fn from_violations(violations: &[ComplexityViolation]) -> Self {
        let errors = violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count();
        let warnings = violations.len() - errors;
        if errors >= 3 {
            RiskLevel::Critical
        } else if errors >= 1 {
            RiskLevel::High
        } else if warnings >= 3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Risk from how many files import this one.
    pub fn from_dependents(count: usize) -> Self {
        match count {
            30.. => RiskLevel::Critical,
            15.. => RiskLevel::High,
            5.. => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub files_analyzed: usize,
    pub total_violations: usize,
    pub by_severity: SeverityCounts,
    /// Mean cyclomatic complexity of all analyzed functions, one decimal.
    pub avg_complexity: f64,
    pub max_complexity: u32,
}

/// Cyclomatic complexity across the functions of a file's dependents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DependentComplexity {
    pub average: f64,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub violations: Vec<ComplexityViolation>,
    pub risk_level: RiskLevel,
    pub dependents: Vec<String>,
    pub dependent_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_complexity: Option<DependentComplexity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub summary: ReportSummary,
    pub files: BTreeMap<String, FileReport>,
}

impl ComplexityReport {
    pub fn violations(&self) -> impl Iterator<Item = &ComplexityViolation> {
        self.files.values().flat_map(|f| f.violations.iter())
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::MetricType;
    use crate::indexer::symbols::SymbolType;

    fn violation(severity: Severity) -> ComplexityViolation {
        ComplexityViolation {
            filepath: "a.ts".into(),
            start_line: 1,
            end_line: 2,
            symbol_name: "f".into(),
            parent_class: None,
            symbol_type: SymbolType::Function,
            language: "typescript".into(),
            metric_type: MetricType::Cyclomatic,
            complexity: 20.0,
            threshold: 15.0,
            severity,
            message: String::new(),
            halstead_details: None,
        }
    }

    #[test]
    fn test_risk_from_violations() {
        assert_eq!(RiskLevel::from_violations(&[]), RiskLevel::Low);
        let warnings = vec![violation(Severity::Warning); 3];
        assert_eq!(RiskLevel::from_violations(&warnings[..2]), RiskLevel::Low);
        assert_eq!(RiskLevel::from_violations(&warnings), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_violations(&[violation(Severity::Error)]), RiskLevel::High);
        let errors = vec![violation(Severity::Error); 3];
        assert_eq!(RiskLevel::from_violations(&errors), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_from_dependents() {
        assert_eq!(RiskLevel::from_dependents(4), RiskLevel::Low);
        assert_eq!(RiskLevel::from_dependents(5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_dependents(15), RiskLevel::High);
        assert_eq!(RiskLevel::from_dependents(30), RiskLevel::Critical);
        assert!(RiskLevel::Low < RiskLevel::Critical);
        assert_eq!(RiskLevel::High.max(RiskLevel::Medium), RiskLevel::High);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = ComplexityReport::default();
        report.files.insert(
            "a.ts".into(),
            FileReport {
                violations: vec![violation(Severity::Warning)],
                risk_level: RiskLevel::Low,
                dependents: Vec::new(),
                dependent_count: 0,
                dependent_complexity: None,
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["summary"]["bySeverity"]["error"].is_number());
        assert_eq!(json["files"]["a.ts"]["riskLevel"], "low");
        assert_eq!(json["files"]["a.ts"]["violations"][0]["metricType"], "cyclomatic");
        assert!(json["files"]["a.ts"].get("dependentComplexity").is_none());
    }
}
