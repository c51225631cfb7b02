use tree_sitter::Node;

use super::{
    ComplexityProfile, ExportExtractor, ImportExtractor, LanguageDefinition, SymbolExtractor,
    Traverser,
};
use crate::indexer::symbols::{
    CallSite, ImportEntry, SymbolInfo, SymbolType, build_symbol, dedupe_preserving_order,
    field_text, named_children, node_text, unquote,
};

pub static GO_COMPLEXITY: ComplexityProfile = ComplexityProfile {
    decision_points: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
        "&&",
        "||",
    ],
    nesting_types: &[
        "if_statement",
        "for_statement",
        "expression_switch_statement",
        "type_switch_statement",
        "select_statement",
    ],
    non_nesting_types: &["else"],
    lambda_types: &["func_literal"],
    logical_expression_types: &["binary_expression"],
    logical_operators: &["&&", "||"],
    operator_symbols: &[
        "=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=", "+", "-",
        "*", "/", "%", "&", "|", "^", "<<", ">>", "&^", "&&", "||", "<-", "++", "--", "==", "!=",
        "<", ">", "<=", ">=", "!", "...", ".", ",", ";", ":",
    ],
    operator_keywords: &[
        "if", "else", "for", "range", "switch", "case", "default", "select", "go", "defer",
        "return", "break", "continue", "goto", "fallthrough", "func", "var", "const", "type",
        "struct", "interface", "map", "chan", "import", "package",
    ],
};

pub fn go_definition() -> LanguageDefinition {
    LanguageDefinition::new(
        "go",
        &["go"],
        || tree_sitter_go::LANGUAGE.into(),
        &GO_COMPLEXITY,
    )
    .display_name("Go")
    .strategies(GoTraverser, GoExports, GoImports, GoSymbols)
}

// ── Traversal ────────────────────────────────────────────────────────

pub struct GoTraverser;

/// First `var name = func(...) {...}` spec of a var declaration, with its
/// function literal.
fn func_literal_spec(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    if node.kind() != "var_declaration" {
        return None;
    }
    let mut specs = named_children(node);
    // var ( ... ) groups its specs in a var_spec_list.
    if let Some(list) = specs.iter().find(|s| s.kind() == "var_spec_list").copied() {
        specs = named_children(list);
    }
    specs.into_iter().find_map(|spec| {
        if spec.kind() != "var_spec" {
            return None;
        }
        let value = spec.child_by_field_name("value")?;
        let literal = named_children(value)
            .into_iter()
            .find(|v| v.kind() == "func_literal")?;
        Some((spec, literal))
    })
}

impl Traverser for GoTraverser {
    fn target_node_types(&self) -> &'static [&'static str] {
        &["function_declaration", "method_declaration", "type_declaration"]
    }

    fn container_types(&self) -> &'static [&'static str] {
        &[]
    }

    fn should_traverse_children(&self, node: Node<'_>) -> bool {
        node.kind() == "source_file"
    }

    fn is_declaration_with_function(&self, node: Node<'_>) -> bool {
        func_literal_spec(node).is_some()
    }

    fn function_in_declaration<'t>(
        &self,
        node: Node<'t>,
        source: &str,
    ) -> Option<(String, Node<'t>)> {
        let (spec, literal) = func_literal_spec(node)?;
        Some((field_text(spec, "name", source)?, literal))
    }

    fn owner_name(&self, node: Node<'_>, source: &str) -> Option<String> {
        (node.kind() == "method_declaration")
            .then(|| receiver_type(node, source))
            .flatten()
    }
}

// ── Exports ──────────────────────────────────────────────────────────

pub struct GoExports;

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn spec_names(spec: Node<'_>, source: &str, out: &mut Vec<String>) {
    let mut cursor = spec.walk();
    for name in spec.children_by_field_name("name", &mut cursor) {
        out.push(node_text(name, source).to_string());
    }
}

impl ExportExtractor for GoExports {
    fn extract_exports(&self, root: Node<'_>, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        for decl in named_children(root) {
            match decl.kind() {
                "function_declaration" | "method_declaration" => {
                    names.extend(field_text(decl, "name", source));
                }
                "type_declaration" | "const_declaration" | "var_declaration" => {
                    for spec in named_children(decl) {
                        match spec.kind() {
                            "type_spec" | "type_alias" | "const_spec" | "var_spec" => {
                                spec_names(spec, source, &mut names)
                            }
                            "var_spec_list" => {
                                for inner in named_children(spec) {
                                    spec_names(inner, source, &mut names);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        dedupe_preserving_order(names.into_iter().filter(|n| is_exported(n)))
    }
}

// ── Imports ──────────────────────────────────────────────────────────

pub struct GoImports;

impl ImportExtractor for GoImports {
    fn import_node_types(&self) -> &'static [&'static str] {
        &["import_spec"]
    }

    /// Standard-library paths have no dot in their first element.
    fn extract_import_path(&self, node: Node<'_>, source: &str) -> Option<String> {
        let path = unquote(node_text(node.child_by_field_name("path")?, source));
        let first = path.split('/').next().unwrap_or(&path);
        first.contains('.').then_some(path)
    }

    fn process_import_symbols(&self, node: Node<'_>, source: &str) -> Option<ImportEntry> {
        let import_path = self.extract_import_path(node, source)?;
        let symbols = match node.child_by_field_name("name") {
            Some(alias) => match node_text(alias, source) {
                "_" | "." => Vec::new(),
                other => vec![other.to_string()],
            },
            None => import_path
                .rsplit('/')
                .next()
                .map(|last| vec![last.to_string()])
                .unwrap_or_default(),
        };
        Some(ImportEntry {
            import_path,
            symbols,
        })
    }
}

// ── Symbols ──────────────────────────────────────────────────────────

pub struct GoSymbols;

/// Receiver type name without pointer or type parameters: `(s *Store[T])` -> `Store`.
fn receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let param = named_children(receiver)
        .into_iter()
        .find(|p| p.kind() == "parameter_declaration")?;
    let ty = node_text(param.child_by_field_name("type")?, source);
    let ty = ty.trim_start_matches('*');
    let ty = ty.split('[').next().unwrap_or(ty);
    Some(ty.trim().to_string())
}

impl SymbolExtractor for GoSymbols {
    fn extract_symbol(
        &self,
        node: Node<'_>,
        source: &str,
        parent_class: Option<&str>,
    ) -> Option<SymbolInfo> {
        let (name, symbol_type) = match node.kind() {
            "function_declaration" => (field_text(node, "name", source)?, SymbolType::Function),
            "method_declaration" => (field_text(node, "name", source)?, SymbolType::Method),
            "func_literal" if parent_class.is_some() => ("func".to_string(), SymbolType::Method),
            "func_literal" => ("func".to_string(), SymbolType::Function),
            "type_declaration" => {
                let spec = named_children(node)
                    .into_iter()
                    .find(|s| s.kind() == "type_spec")?;
                let symbol_type = match spec.child_by_field_name("type")?.kind() {
                    "struct_type" => SymbolType::Class,
                    "interface_type" => SymbolType::Interface,
                    _ => return None,
                };
                (field_text(spec, "name", source)?, symbol_type)
            }
            _ => return None,
        };
        Some(build_symbol(
            node,
            source,
            name,
            symbol_type,
            "go",
            &GO_COMPLEXITY,
        ))
    }

    fn call_expression_types(&self) -> &'static [&'static str] {
        &["call_expression"]
    }

    fn extract_call_site(&self, node: Node<'_>, source: &str) -> Option<CallSite> {
        let callee = node.child_by_field_name("function")?;
        let symbol = match callee.kind() {
            "identifier" => node_text(callee, source).to_string(),
            "selector_expression" => field_text(callee, "field", source)?,
            _ => return None,
        };
        Some(CallSite {
            symbol,
            line: node.start_position().row + 1,
            key: node_text(callee, source).to_string(),
        })
    }
}
