//! TypeScript and JavaScript. Both grammars share node names, so one set of
//! strategies serves the two definitions.
use tree_sitter::Node;

use super::{
    ComplexityProfile, ExportExtractor, ImportExtractor, LanguageDefinition, SymbolExtractor,
    Traverser,
};
use crate::indexer::symbols::{
    CallSite, ImportEntry, SymbolInfo, SymbolType, build_symbol, dedupe_preserving_order,
    field_text, named_children, node_text, unquote,
};

pub static ECMASCRIPT_COMPLEXITY: ComplexityProfile = ComplexityProfile {
    decision_points: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "for_in_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
        "&&",
        "||",
        "??",
    ],
    nesting_types: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
    ],
    non_nesting_types: &["else_clause", "ternary_expression"],
    lambda_types: &["arrow_function", "function_expression", "generator_function"],
    logical_expression_types: &["binary_expression"],
    logical_operators: &["&&", "||"],
    operator_symbols: &[
        "=", "+=", "-=", "*=", "/=", "%=", "**=", "&&=", "||=", "??=", "<<=", ">>=", ">>>=",
        "&=", "|=", "^=", "+", "-", "*", "/", "%", "**", "++", "--", "==", "===", "!=", "!==",
        "<", ">", "<=", ">=", "&&", "||", "??", "!", "&", "|", "^", "~", "<<", ">>", ">>>", "?",
        ":", ".", "?.", "...", "=>", ",", ";",
    ],
    operator_keywords: &[
        "if", "else", "for", "while", "do", "switch", "case", "default", "break", "continue",
        "return", "throw", "try", "catch", "finally", "new", "delete", "typeof", "instanceof",
        "in", "of", "void", "await", "yield", "async", "function", "class", "const", "let",
        "var", "import", "export", "extends", "implements",
    ],
};

pub fn typescript_definition() -> LanguageDefinition {
    LanguageDefinition::new(
        "typescript",
        &["ts", "tsx", "mts", "cts"],
        || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        &ECMASCRIPT_COMPLEXITY,
    )
    .display_name("TypeScript")
    .dialect("tsx", || tree_sitter_typescript::LANGUAGE_TSX.into())
    .strategies(
        EcmaTraverser,
        EcmaExports,
        EcmaImports,
        EcmaSymbols::new("typescript"),
    )
}

pub fn javascript_definition() -> LanguageDefinition {
    LanguageDefinition::new(
        "javascript",
        &["js", "jsx", "mjs", "cjs"],
        || tree_sitter_javascript::LANGUAGE.into(),
        &ECMASCRIPT_COMPLEXITY,
    )
    .display_name("JavaScript")
    .strategies(
        EcmaTraverser,
        EcmaExports,
        EcmaImports,
        EcmaSymbols::new("javascript"),
    )
}

const FUNCTION_VALUE_TYPES: &[&str] = &["arrow_function", "function_expression", "generator_function"];

// ── Traversal ────────────────────────────────────────────────────────

pub struct EcmaTraverser;

impl Traverser for EcmaTraverser {
    fn target_node_types(&self) -> &'static [&'static str] {
        &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
            "interface_declaration",
        ]
    }

    fn container_types(&self) -> &'static [&'static str] {
        &["class_declaration", "abstract_class_declaration", "class"]
    }

    fn should_traverse_children(&self, node: Node<'_>) -> bool {
        matches!(
            node.kind(),
            "program" | "export_statement" | "internal_module" | "module" | "statement_block"
        )
    }

    fn is_declaration_with_function(&self, node: Node<'_>) -> bool {
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => named_children(node)
                .into_iter()
                .any(|d| declarator_function(d).is_some()),
            "public_field_definition" | "field_definition" => node
                .child_by_field_name("value")
                .is_some_and(|v| FUNCTION_VALUE_TYPES.contains(&v.kind())),
            _ => false,
        }
    }

    fn function_in_declaration<'t>(
        &self,
        node: Node<'t>,
        source: &str,
    ) -> Option<(String, Node<'t>)> {
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                named_children(node).into_iter().find_map(|declarator| {
                    let function = declarator_function(declarator)?;
                    let name = field_text(declarator, "name", source)?;
                    Some((name, function))
                })
            }
            _ => {
                let function = node.child_by_field_name("value")?;
                let name = field_text(node, "name", source)
                    .or_else(|| field_text(node, "property", source))?;
                Some((name, function))
            }
        }
    }
}

fn declarator_function(declarator: Node<'_>) -> Option<Node<'_>> {
    if declarator.kind() != "variable_declarator" {
        return None;
    }
    declarator
        .child_by_field_name("value")
        .filter(|v| FUNCTION_VALUE_TYPES.contains(&v.kind()))
}

// ── Exports ──────────────────────────────────────────────────────────

pub struct EcmaExports;

impl ExportExtractor for EcmaExports {
    fn extract_exports(&self, root: Node<'_>, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        for child in named_children(root) {
            if child.kind() == "export_statement" {
                collect_export(child, source, &mut names);
            }
        }
        dedupe_preserving_order(names)
    }
}

fn collect_export(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    let is_default = node.children(&mut cursor).any(|c| c.kind() == "default");
    if is_default {
        out.push("default".to_string());
        return;
    }

    if let Some(declaration) = node.child_by_field_name("declaration") {
        declaration_names(declaration, source, out);
        return;
    }

    for child in named_children(node) {
        match child.kind() {
            "export_clause" => {
                for specifier in named_children(child) {
                    if specifier.kind() != "export_specifier" {
                        continue;
                    }
                    if let Some(name) = field_text(specifier, "alias", source)
                        .or_else(|| field_text(specifier, "name", source))
                    {
                        out.push(unquote(&name));
                    }
                }
            }
            // export * as ns from "./mod"
            "namespace_export" => {
                if let Some(id) = named_children(child).into_iter().next() {
                    out.push(node_text(id, source).to_string());
                }
            }
            _ => {}
        }
    }
}

fn declaration_names(declaration: Node<'_>, source: &str, out: &mut Vec<String>) {
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            for declarator in named_children(declaration) {
                if let Some(name) = declarator.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        out.push(node_text(name, source).to_string());
                    }
                }
            }
        }
        "ambient_declaration" => {
            for inner in named_children(declaration) {
                declaration_names(inner, source, out);
            }
        }
        _ => {
            if let Some(name) = field_text(declaration, "name", source) {
                out.push(name);
            }
        }
    }
}

// ── Imports ──────────────────────────────────────────────────────────

pub struct EcmaImports;

fn is_local_specifier(path: &str) -> bool {
    path.starts_with('.') || path.starts_with('/') || path.starts_with("@/") || path.starts_with("~/")
}

fn require_argument<'t>(node: Node<'t>, source: &str) -> Option<Node<'t>> {
    let function = node.child_by_field_name("function")?;
    if !matches!(node_text(function, source), "require" | "import") {
        return None;
    }
    let arguments = node.child_by_field_name("arguments")?;
    named_children(arguments)
        .into_iter()
        .next()
        .filter(|arg| arg.kind() == "string")
}

impl ImportExtractor for EcmaImports {
    fn import_node_types(&self) -> &'static [&'static str] {
        &["import_statement", "export_statement", "call_expression"]
    }

    fn extract_import_path(&self, node: Node<'_>, source: &str) -> Option<String> {
        let literal = match node.kind() {
            "call_expression" => require_argument(node, source)?,
            _ => node.child_by_field_name("source")?,
        };
        let path = unquote(node_text(literal, source));
        is_local_specifier(&path).then_some(path)
    }

    fn process_import_symbols(&self, node: Node<'_>, source: &str) -> Option<ImportEntry> {
        let import_path = self.extract_import_path(node, source)?;
        let mut symbols = Vec::new();

        match node.kind() {
            "import_statement" => {
                for clause in named_children(node) {
                    if clause.kind() != "import_clause" {
                        continue;
                    }
                    for part in named_children(clause) {
                        match part.kind() {
                            "identifier" => symbols.push(node_text(part, source).to_string()),
                            "namespace_import" => {
                                if let Some(id) = named_children(part).into_iter().next() {
                                    symbols.push(node_text(id, source).to_string());
                                }
                            }
                            "named_imports" => {
                                for spec in named_children(part) {
                                    if let Some(local) = field_text(spec, "alias", source)
                                        .or_else(|| field_text(spec, "name", source))
                                    {
                                        symbols.push(local);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            "export_statement" => {
                for clause in named_children(node) {
                    if clause.kind() == "export_clause" {
                        for spec in named_children(clause) {
                            if let Some(name) = field_text(spec, "name", source) {
                                symbols.push(name);
                            }
                        }
                    }
                }
            }
            // const { a, b } = require("./x") / const x = require("./x")
            _ => {
                if let Some(declarator) = node.parent().filter(|p| p.kind() == "variable_declarator") {
                    if let Some(binding) = declarator.child_by_field_name("name") {
                        match binding.kind() {
                            "identifier" => symbols.push(node_text(binding, source).to_string()),
                            "object_pattern" => {
                                for prop in named_children(binding) {
                                    let local = match prop.kind() {
                                        "shorthand_property_identifier_pattern" => {
                                            Some(node_text(prop, source).to_string())
                                        }
                                        "pair_pattern" => field_text(prop, "value", source),
                                        _ => None,
                                    };
                                    symbols.extend(local);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        Some(ImportEntry {
            import_path,
            symbols: dedupe_preserving_order(symbols),
        })
    }
}

// ── Symbols ──────────────────────────────────────────────────────────

pub struct EcmaSymbols {
    language: &'static str,
}

impl EcmaSymbols {
    pub fn new(language: &'static str) -> Self {
        Self { language }
    }
}

impl SymbolExtractor for EcmaSymbols {
    fn extract_symbol(
        &self,
        node: Node<'_>,
        source: &str,
        parent_class: Option<&str>,
    ) -> Option<SymbolInfo> {
        let symbol_type = match node.kind() {
            "function_declaration" | "generator_function_declaration" => SymbolType::Function,
            "method_definition" => SymbolType::Method,
            "arrow_function" | "function_expression" | "generator_function" => {
                if parent_class.is_some() {
                    SymbolType::Method
                } else {
                    SymbolType::Function
                }
            }
            "interface_declaration" => SymbolType::Interface,
            "class_declaration" | "abstract_class_declaration" | "class" => SymbolType::Class,
            _ => return None,
        };
        let name = field_text(node, "name", source).unwrap_or_else(|| "anonymous".to_string());
        Some(build_symbol(
            node,
            source,
            name,
            symbol_type,
            self.language,
            &ECMASCRIPT_COMPLEXITY,
        ))
    }

    fn call_expression_types(&self) -> &'static [&'static str] {
        &["call_expression", "new_expression"]
    }

    fn extract_call_site(&self, node: Node<'_>, source: &str) -> Option<CallSite> {
        let callee = node
            .child_by_field_name("function")
            .or_else(|| node.child_by_field_name("constructor"))?;
        let symbol = match callee.kind() {
            "identifier" => node_text(callee, source).to_string(),
            "member_expression" => field_text(callee, "property", source)?,
            _ => return None,
        };
        let key: String = node_text(callee, source)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        Some(CallSite {
            symbol,
            line: node.start_position().row + 1,
            key,
        })
    }
}
