use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::indexer::symbols::node_text;
use crate::indexer::traversal::for_each_node;
use crate::languages::{ComplexityProfile, all_lambda_types};

/// Operator key shared by closures of every grammar.
const CLOSURE_OPERATOR: &str = "closure";

/// Composite expression nodes counted as one operator each, across all
/// supported grammars.
const COMPOUND_OPERATOR_TYPES: &[&str] = &[
    // TypeScript / JavaScript
    "binary_expression",
    "unary_expression",
    "update_expression",
    "assignment_expression",
    "augmented_assignment_expression",
    "call_expression",
    "new_expression",
    "member_expression",
    "subscript_expression",
    "ternary_expression",
    "await_expression",
    "array",
    "object",
    // Python
    "call",
    "attribute",
    "subscript",
    "boolean_operator",
    "comparison_operator",
    "not_operator",
    "binary_operator",
    "unary_operator",
    "assignment",
    "augmented_assignment",
    "list",
    "dictionary",
    "tuple",
    // Go
    "selector_expression",
    "index_expression",
    "slice_expression",
    "composite_literal",
    "type_assertion_expression",
    // Rust
    "field_expression",
    "compound_assignment_expr",
    "reference_expression",
    "try_expression",
    "array_expression",
    "struct_expression",
];

/// Leaf node types counted as operands, keyed by their text.
const OPERAND_TYPES: &[&str] = &[
    "identifier",
    "property_identifier",
    "shorthand_property_identifier",
    "private_property_identifier",
    "field_identifier",
    "type_identifier",
    "package_identifier",
    "number",
    "string",
    "template_string",
    "regex",
    "integer",
    "float",
    "int_literal",
    "float_literal",
    "imaginary_literal",
    "rune_literal",
    "interpreted_string_literal",
    "raw_string_literal",
    "integer_literal",
    "string_literal",
    "char_literal",
    "boolean_literal",
    "true",
    "false",
    "null",
    "undefined",
    "none",
    "nil",
    "iota",
    "this",
    "self",
    "super",
];

/// Raw operator/operand occurrence counts of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HalsteadCounts {
    pub operators: HashMap<String, u32>,
    pub operands: HashMap<String, u32>,
}

impl HalsteadCounts {
    /// n1
    pub fn distinct_operators(&self) -> u32 {
        self.operators.len() as u32
    }

    /// n2
    pub fn distinct_operands(&self) -> u32 {
        self.operands.len() as u32
    }

    /// N1
    pub fn total_operators(&self) -> u32 {
        self.operators.values().sum()
    }

    /// N2
    pub fn total_operands(&self) -> u32 {
        self.operands.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HalsteadMetrics {
    pub distinct_operators: u32,
    pub distinct_operands: u32,
    pub total_operators: u32,
    pub total_operands: u32,
    pub vocabulary: u32,
    pub length: u32,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    /// Seconds (effort / 18).
    pub time: f64,
    /// Estimated delivered bugs (volume / 3000).
    pub bugs: f64,
}

/// Counts operators and operands below `node`.
pub fn count_halstead(node: Node<'_>, source: &str, profile: &ComplexityProfile) -> HalsteadCounts {
    let mut counts = HalsteadCounts::default();
    for_each_node(node, |n| {
        let kind = n.kind();
        if n.is_named() && all_lambda_types().contains(kind) {
            // `=>`, `lambda`, `func` and `|..|` closures count alike.
            *counts.operators.entry(CLOSURE_OPERATOR.to_string()).or_default() += 1;
        } else if n.is_named() && COMPOUND_OPERATOR_TYPES.contains(&kind) {
            *counts.operators.entry(kind.to_string()).or_default() += 1;
        } else if OPERAND_TYPES.contains(&kind) && (n.child_count() == 0 || is_string_literal(kind)) {
            let text = node_text(n, source);
            *counts.operands.entry(text.to_string()).or_default() += 1;
        } else if n.child_count() == 0 && profile.is_operator_text(kind) {
            *counts.operators.entry(kind.to_string()).or_default() += 1;
        }
    });
    counts
}

/// String literals carry quote and fragment children but are one operand.
fn is_string_literal(kind: &str) -> bool {
    matches!(
        kind,
        "string"
            | "template_string"
            | "interpreted_string_literal"
            | "raw_string_literal"
            | "string_literal"
    )
}

/// Derived Halstead measures. Empty counts yield all zeros, never NaN.
pub fn calculate_halstead(counts: &HalsteadCounts) -> HalsteadMetrics {
    let n1 = counts.distinct_operators();
    let n2 = counts.distinct_operands();
    let big_n1 = counts.total_operators();
    let big_n2 = counts.total_operands();

    let vocabulary = n1 + n2;
    let length = big_n1 + big_n2;
    let volume = if vocabulary > 0 {
        f64::from(length) * f64::from(vocabulary).log2()
    } else {
        0.0
    };
    let difficulty = if n2 > 0 {
        (f64::from(n1) / 2.0) * (f64::from(big_n2) / f64::from(n2))
    } else {
        0.0
    };
    let effort = difficulty * volume;

    HalsteadMetrics {
        distinct_operators: n1,
        distinct_operands: n2,
        total_operators: big_n1,
        total_operands: big_n2,
        vocabulary,
        length,
        volume: finite(volume),
        difficulty: finite(difficulty),
        effort: finite(effort),
        time: finite(effort / 18.0),
        bugs: finite(volume / 3000.0),
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
