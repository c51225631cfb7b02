//! Cognitive complexity (SonarSource flavour).
//!
//! * nesting control flow costs `1 + nesting` and nests its body,
//! * `else`/ternary cost a flat `1`,
//! * a run of the same logical operator costs `1`; switching operators costs again,
//! * a closure costs `1` only when already nested, and nests its body.
use tree_sitter::Node;

use crate::indexer::symbols::named_children;
use crate::languages::ComplexityProfile;

/// Cognitive complexity of the subtree below `node`. Children of `node`
/// start at nesting level 0.
pub fn calculate_cognitive(node: Node<'_>, profile: &ComplexityProfile) -> u32 {
    children(node)
        .into_iter()
        .map(|child| score(child, profile, 0, None))
        .sum()
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn score(
    node: Node<'_>,
    profile: &ComplexityProfile,
    nesting: u32,
    last_operator: Option<&'static str>,
) -> u32 {
    let kind = node.kind();

    if let Some(operator) = profile.logical_operator(node) {
        let own = u32::from(last_operator != Some(operator));
        return own
            + children(node)
                .into_iter()
                .map(|c| score(c, profile, nesting, Some(operator)))
                .sum::<u32>();
    }

    if node.is_named() && profile.nesting_types.contains(&kind) {
        let condition = node.child_by_field_name("condition").map(|c| c.id());
        let mut total = 1 + nesting;
        for child in children(node) {
            let same_level = condition == Some(child.id())
                || profile.non_nesting_types.contains(&child.kind());
            let level = if same_level { nesting } else { nesting + 1 };
            total += score(child, profile, level, None);
        }
        return total;
    }

    if profile.non_nesting_types.contains(&kind) {
        return 1 + children(node)
            .into_iter()
            .map(|c| score(c, profile, nesting + 1, None))
            .sum::<u32>();
    }

    if node.is_named() && profile.lambda_types.contains(&kind) {
        let own = u32::from(nesting > 0);
        return own
            + named_children(node)
                .into_iter()
                .map(|c| score(c, profile, nesting + 1, None))
                .sum::<u32>();
    }

    children(node)
        .into_iter()
        .map(|c| score(c, profile, nesting, None))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::parse_source;
    use crate::languages::registry;

    /// Cognitive complexity of the first function in `src`.
    fn cognitive(lang: &str, src: &str) -> u32 {
        let def = registry().get(lang).unwrap();
        let tree = parse_source(src, def).unwrap();
        let function = named_children(tree.root_node())[0];
        calculate_cognitive(function, def.complexity)
    }

    #[test]
    fn test_linear_code_is_zero() {
        let src = "function f(a, b) {\n  const c = a + b;\n  return c * 2;\n}";
        assert_eq!(cognitive("typescript", src), 0);
    }

    #[test]
    fn test_single_if() {
        let src = "function f(x) {\n  if (x) { return 1; }\n  return 0;\n}";
        assert_eq!(cognitive("typescript", src), 1);
    }

    #[test]
    fn test_if_inside_for() {
        let src = "function f(xs) {\n  for (const x of xs) {\n    if (x) { log(x); }\n  }\n}";
        // for: 1, nested if: 1 + 1
        assert_eq!(cognitive("typescript", src), 3);
    }

    #[test]
    fn test_two_level_nested_if() {
        let src = "function f(a, b) {\n  if (a) {\n    if (b) { return 1; }\n  }\n  return 0;\n}";
        assert_eq!(cognitive("typescript", src), 3);
    }

    #[test]
    fn test_three_level_nested_if() {
        let src = "function f(a, b, c) {\n  if (a) {\n    if (b) {\n      if (c) { return 1; }\n    }\n  }\n  return 0;\n}";
        assert_eq!(cognitive("typescript", src), 6);
    }

    #[test]
    fn test_if_with_repeated_operator() {
        let src = "function f(a, b, c) {\n  if (a && b && c) { return 1; }\n  return 0;\n}";
        assert_eq!(cognitive("typescript", src), 2);
    }

    #[test]
    fn test_if_with_operator_change() {
        let src = "function f(a, b, c) {\n  if (a && b || c) { return 1; }\n  return 0;\n}";
        assert_eq!(cognitive("typescript", src), 3);
    }

    #[test]
    fn test_same_operator_run_counts_once() {
        let src = "function f(a, b, c) {\n  return a && b && c;\n}";
        assert_eq!(cognitive("typescript", src), 1);
    }

    #[test]
    fn test_mixed_operators_count_each_switch() {
        let src = "function f(a, b, c) {\n  return a && b || c;\n}";
        assert_eq!(cognitive("typescript", src), 2);
    }

    #[test]
    fn test_top_level_lambda_is_free() {
        let src = "function f(xs) {\n  return xs.map(x => x * 2);\n}";
        assert_eq!(cognitive("typescript", src), 0);
    }

    #[test]
    fn test_nested_lambda_and_its_body() {
        let src = "function f(xs) {\n  if (xs) {\n    xs.forEach(x => {\n      if (x) { log(x); }\n    });\n  }\n}";
        // if: 1, lambda at nesting 1: 1, if inside lambda at nesting 2: 1 + 2
        assert_eq!(cognitive("typescript", src), 5);
    }

    #[test]
    fn test_else_is_flat() {
        let src = "function f(x) {\n  if (x) {\n    return 1;\n  } else {\n    return 2;\n  }\n}";
        assert_eq!(cognitive("typescript", src), 2);
    }

    #[test]
    fn test_python_elif_chain() {
        let src = "def f(x):\n    if x == 1:\n        return 1\n    elif x == 2:\n        return 2\n    else:\n        return 3\n";
        assert_eq!(cognitive("python", src), 3);
    }

    #[test]
    fn test_go_nested_loops() {
        let src = "package main\n\nfunc f(m [][]int) int {\n\tfor _, row := range m {\n\t\tfor _, v := range row {\n\t\t\tif v > 0 {\n\t\t\t\treturn v\n\t\t\t}\n\t\t}\n\t}\n\treturn 0\n}\n";
        let def = registry().get("go").unwrap();
        let tree = parse_source(src, def).unwrap();
        let function = named_children(tree.root_node())
            .into_iter()
            .find(|n| n.kind() == "function_declaration")
            .unwrap();
        // 1 + 2 + 3
        assert_eq!(calculate_cognitive(function, def.complexity), 6);
    }
}
