use tree_sitter::Node;

use super::{
    ComplexityProfile, ExportExtractor, ImportExtractor, LanguageDefinition, SymbolExtractor,
    Traverser,
};
use crate::indexer::symbols::{
    CallSite, ImportEntry, SymbolInfo, SymbolType, build_symbol, dedupe_preserving_order,
    field_text, named_children, node_text,
};

pub static RUST_COMPLEXITY: ComplexityProfile = ComplexityProfile {
    decision_points: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "loop_expression",
        "match_arm",
        "&&",
        "||",
    ],
    nesting_types: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "loop_expression",
        "match_expression",
    ],
    non_nesting_types: &["else_clause"],
    lambda_types: &["closure_expression"],
    logical_expression_types: &["binary_expression"],
    logical_operators: &["&&", "||"],
    operator_symbols: &[
        "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "+", "-", "*", "/",
        "%", "&", "|", "^", "!", "<<", ">>", "&&", "||", "==", "!=", "<", ">", "<=", ">=", "?",
        "..", "..=", "=>", "->", "::", ".", ",", ";",
    ],
    operator_keywords: &[
        "if", "else", "match", "for", "in", "while", "loop", "break", "continue", "return",
        "let", "mut", "ref", "move", "as", "fn", "impl", "struct", "enum", "trait", "type", "use",
        "mod", "pub", "const", "static", "unsafe", "async", "await", "dyn", "where",
    ],
};

pub fn rust_definition() -> LanguageDefinition {
    LanguageDefinition::new(
        "rust",
        &["rs"],
        || tree_sitter_rust::LANGUAGE.into(),
        &RUST_COMPLEXITY,
    )
    .display_name("Rust")
    .strategies(RustTraverser, RustExports, RustImports, RustSymbols)
}

// ── Traversal ────────────────────────────────────────────────────────

pub struct RustTraverser;

/// `Store<T>` -> `Store`, `crate::a::Store` -> `Store`.
fn base_type_name(node: Node<'_>, source: &str) -> String {
    let target = match node.kind() {
        "generic_type" => node.child_by_field_name("type").unwrap_or(node),
        _ => node,
    };
    let text = node_text(target, source);
    text.rsplit("::").next().unwrap_or(text).trim().to_string()
}

impl Traverser for RustTraverser {
    fn target_node_types(&self) -> &'static [&'static str] {
        &["function_item", "struct_item", "enum_item", "trait_item"]
    }

    fn container_types(&self) -> &'static [&'static str] {
        &["impl_item"]
    }

    fn should_traverse_children(&self, node: Node<'_>) -> bool {
        matches!(node.kind(), "source_file" | "mod_item" | "declaration_list")
    }

    /// `impl Trait for Type` groups its methods under `Type`.
    fn container_name(&self, node: Node<'_>, source: &str) -> Option<String> {
        node.child_by_field_name("type")
            .map(|ty| base_type_name(ty, source))
    }
}

// ── Exports ──────────────────────────────────────────────────────────

pub struct RustExports;

fn is_public(item: Node<'_>, source: &str) -> bool {
    named_children(item)
        .into_iter()
        .any(|c| c.kind() == "visibility_modifier" && node_text(c, source) == "pub")
}

/// Names a `use` tree brings into scope.
fn use_tree_names(tree: Node<'_>, source: &str, out: &mut Vec<String>) {
    match tree.kind() {
        "identifier" => out.push(node_text(tree, source).to_string()),
        "scoped_identifier" => out.extend(field_text(tree, "name", source)),
        "use_as_clause" => out.extend(field_text(tree, "alias", source)),
        "scoped_use_list" => {
            if let Some(list) = tree.child_by_field_name("list") {
                use_tree_names(list, source, out);
            }
        }
        "use_list" => {
            for item in named_children(tree) {
                use_tree_names(item, source, out);
            }
        }
        _ => {}
    }
}

impl ExportExtractor for RustExports {
    fn extract_exports(&self, root: Node<'_>, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        for item in named_children(root) {
            if !is_public(item, source) {
                continue;
            }
            match item.kind() {
                "function_item" | "struct_item" | "enum_item" | "trait_item" | "type_item"
                | "const_item" | "static_item" | "mod_item" | "union_item" => {
                    names.extend(field_text(item, "name", source));
                }
                "use_declaration" => {
                    if let Some(argument) = item.child_by_field_name("argument") {
                        use_tree_names(argument, source, &mut names);
                    }
                }
                _ => {}
            }
        }
        dedupe_preserving_order(names)
    }
}

// ── Imports ──────────────────────────────────────────────────────────

pub struct RustImports;

fn is_local_path(path: &str) -> bool {
    let root = path.split("::").next().unwrap_or(path);
    matches!(root, "crate" | "super" | "self")
}

impl RustImports {
    fn flatten_use(&self, tree: Node<'_>, source: &str, out: &mut Vec<ImportEntry>) {
        match tree.kind() {
            "scoped_identifier" | "identifier" => {
                let path = node_text(tree, source).to_string();
                let symbol = path.rsplit("::").next().unwrap_or(&path).to_string();
                out.push(ImportEntry {
                    import_path: path,
                    symbols: vec![symbol],
                });
            }
            "use_as_clause" => {
                if let (Some(path), Some(alias)) =
                    (field_text(tree, "path", source), field_text(tree, "alias", source))
                {
                    out.push(ImportEntry {
                        import_path: path,
                        symbols: vec![alias],
                    });
                }
            }
            "scoped_use_list" => {
                let Some(path) = field_text(tree, "path", source) else {
                    return;
                };
                let mut symbols = Vec::new();
                if let Some(list) = tree.child_by_field_name("list") {
                    for item in named_children(list) {
                        if item.kind() == "self" {
                            symbols.push(path.rsplit("::").next().unwrap_or(&path).to_string());
                        } else {
                            use_tree_names(item, source, &mut symbols);
                        }
                    }
                }
                out.push(ImportEntry {
                    import_path: path,
                    symbols,
                });
            }
            "use_wildcard" => {
                let text = node_text(tree, source);
                out.push(ImportEntry {
                    import_path: text.trim_end_matches("::*").to_string(),
                    symbols: vec!["*".to_string()],
                });
            }
            _ => {}
        }
    }
}

impl ImportExtractor for RustImports {
    fn import_node_types(&self) -> &'static [&'static str] {
        &["use_declaration"]
    }

    fn extract_import_path(&self, node: Node<'_>, source: &str) -> Option<String> {
        self.process_import_symbols(node, source)
            .map(|entry| entry.import_path)
    }

    fn process_import_symbols(&self, node: Node<'_>, source: &str) -> Option<ImportEntry> {
        self.import_entries(node, source).into_iter().next()
    }

    fn import_entries(&self, node: Node<'_>, source: &str) -> Vec<ImportEntry> {
        let Some(argument) = node.child_by_field_name("argument") else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        self.flatten_use(argument, source, &mut entries);
        entries.retain(|e| is_local_path(&e.import_path));
        entries
    }
}

// ── Symbols ──────────────────────────────────────────────────────────

pub struct RustSymbols;

impl SymbolExtractor for RustSymbols {
    fn extract_symbol(
        &self,
        node: Node<'_>,
        source: &str,
        parent_class: Option<&str>,
    ) -> Option<SymbolInfo> {
        let symbol_type = match node.kind() {
            "function_item" | "closure_expression" if parent_class.is_some() => SymbolType::Method,
            "function_item" | "closure_expression" => SymbolType::Function,
            "struct_item" | "enum_item" => SymbolType::Class,
            "trait_item" => SymbolType::Interface,
            _ => return None,
        };
        let name = field_text(node, "name", source).unwrap_or_else(|| "closure".to_string());
        Some(build_symbol(
            node,
            source,
            name,
            symbol_type,
            "rust",
            &RUST_COMPLEXITY,
        ))
    }

    fn call_expression_types(&self) -> &'static [&'static str] {
        &["call_expression"]
    }

    fn extract_call_site(&self, node: Node<'_>, source: &str) -> Option<CallSite> {
        let mut callee = node.child_by_field_name("function")?;
        if callee.kind() == "generic_function" {
            callee = callee.child_by_field_name("function")?;
        }
        let symbol = match callee.kind() {
            "identifier" => node_text(callee, source).to_string(),
            "field_expression" => field_text(callee, "field", source)?,
            "scoped_identifier" => field_text(callee, "name", source)?,
            _ => return None,
        };
        Some(CallSite {
            symbol,
            line: node.start_position().row + 1,
            key: node_text(callee, source).to_string(),
        })
    }
}
