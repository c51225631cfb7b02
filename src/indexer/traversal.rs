//! Generic symbol traversal driven by a language's [`Traverser`].
use tree_sitter::Node;

use crate::indexer::symbols::named_children;
use crate::languages::Traverser;

/// A node that becomes one symbol chunk.
#[derive(Debug, Clone)]
pub struct SymbolTarget<'t> {
    /// Node handed to the symbol extractor.
    pub node: Node<'t>,
    /// Node whose text and lines form the chunk. Differs from `node` for a
    /// function bound by a declaration (`const f = () => {}`) and for
    /// decorated definitions.
    pub span: Node<'t>,
    /// Name taken from the enclosing declaration.
    pub bound_name: Option<String>,
    pub parent_class: Option<String>,
    /// Number of containers entered above this target.
    pub nesting_level: usize,
}

/// Collects symbol targets below `root` in document order.
///
/// Targets are not descended into. Containers with members are split into
/// their members; containers without any are emitted as a single target.
pub fn collect_targets<'t>(
    root: Node<'t>,
    source: &str,
    traverser: &dyn Traverser,
) -> Vec<SymbolTarget<'t>> {
    let mut out = Vec::new();
    visit(root, source, traverser, None, 0, &mut out);
    out
}

fn visit<'t>(
    node: Node<'t>,
    source: &str,
    traverser: &dyn Traverser,
    container: Option<&str>,
    nesting_level: usize,
    out: &mut Vec<SymbolTarget<'t>>,
) {
    if traverser.is_target(node) {
        out.push(SymbolTarget {
            node,
            span: traverser.chunk_span(node),
            bound_name: None,
            parent_class: container
                .map(String::from)
                .or_else(|| traverser.owner_name(node, source)),
            nesting_level,
        });
        return;
    }

    if traverser.is_container(node) {
        if !traverser.should_extract_children(node) {
            out.push(SymbolTarget {
                node,
                span: traverser.chunk_span(node),
                bound_name: None,
                parent_class: container.map(String::from),
                nesting_level,
            });
            return;
        }
        let name = traverser.container_name(node, source);
        let parent = name.as_deref().or(container);
        if let Some(body) = traverser.container_body(node) {
            for child in named_children(body) {
                visit(child, source, traverser, parent, nesting_level + 1, out);
            }
        }
        return;
    }

    if traverser.is_declaration_with_function(node) {
        if let Some((name, function)) = traverser.function_in_declaration(node, source) {
            out.push(SymbolTarget {
                node: function,
                span: node,
                bound_name: Some(name),
                parent_class: container.map(String::from),
                nesting_level,
            });
        }
        return;
    }

    if traverser.should_traverse_children(node) {
        for child in named_children(node) {
            visit(child, source, traverser, container, nesting_level, out);
        }
    }
}

/// Pre-order walk over every node (named and anonymous) below `root`,
/// without recursion.
pub fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    'outer: loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'outer;
            }
            if !cursor.goto_parent() {
                break 'outer;
            }
        }
    }
}
