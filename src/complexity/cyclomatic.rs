use tree_sitter::Node;

use crate::indexer::traversal::for_each_node;
use crate::languages::ComplexityProfile;

/// McCabe complexity: one plus the number of decision points in the subtree.
///
/// Both named nodes and anonymous operator tokens (`&&`, `or`) count, so a
/// language lists logical operators among its decision points.
pub fn calculate_cyclomatic(node: Node<'_>, profile: &ComplexityProfile) -> u32 {
    let mut decisions = 0;
    for_each_node(node, |n| {
        if profile.is_decision_point(n.kind()) {
            decisions += 1;
        }
    });
    1 + decisions
}
