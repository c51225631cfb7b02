//! Complexity metrics computed over syntax subtrees, and threshold checks.
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::languages::ComplexityProfile;

pub mod cognitive;
pub mod cyclomatic;
pub mod halstead;
pub mod violations;

pub use cognitive::calculate_cognitive;
pub use cyclomatic::calculate_cyclomatic;
pub use halstead::{HalsteadCounts, HalsteadMetrics, calculate_halstead, count_halstead};
pub use violations::{ComplexityThresholds, ComplexityViolation, MetricType, Severity};

/// All metrics of one function-like subtree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityMetrics {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub halstead: HalsteadMetrics,
}

impl ComplexityMetrics {
    pub fn analyze(node: Node<'_>, source: &str, profile: &ComplexityProfile) -> Self {
        Self {
            cyclomatic: calculate_cyclomatic(node, profile),
            cognitive: calculate_cognitive(node, profile),
            halstead: calculate_halstead(&count_halstead(node, source, profile)),
        }
    }
}
