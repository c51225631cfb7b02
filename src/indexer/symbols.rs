use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::complexity::cyclomatic::calculate_cyclomatic;
use crate::indexer::traversal::for_each_node;
use crate::languages::{ComplexityProfile, ImportExtractor, SymbolExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Interface,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Method => "method",
            SymbolType::Class => "class",
            SymbolType::Interface => "interface",
        }
    }

    /// Functions and methods carry complexity metrics.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolType::Function | SymbolType::Method)
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declaration extracted from a syntax tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub symbol_type: SymbolType,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub complexity: Option<u32>,
}

/// A call made from inside a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSite {
    /// Last segment of the callee (`save` for `this.repo.save()`).
    pub symbol: String,
    pub line: usize,
    /// Qualified callee text (`this.repo.save`, `Config::load`).
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub import_path: String,
    /// Locally bound names; aliases resolve to the alias.
    pub symbols: Vec<String>,
}

// ── Node helpers ─────────────────────────────────────────────────────

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// 1-based inclusive line span. A node ending at column 0 ends on the
/// previous line.
pub fn line_span(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position().row + 1;
    let end_pos = node.end_position();
    let end = if end_pos.column == 0 && end_pos.row > node.start_position().row {
        end_pos.row
    } else {
        end_pos.row + 1
    };
    (start, end.max(start))
}

/// Strips matching quotes from a string literal.
pub fn unquote(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Keeps the first occurrence of every name.
pub fn dedupe_preserving_order(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Declaration header: text up to the body opener (or the Python `:`).
pub fn extract_signature(content: &str, language: &str) -> String {
    let first_lines: String = content.lines().take(5).collect::<Vec<_>>().join("\n");

    if language == "python" {
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('@') {
                continue;
            }
            if trimmed.ends_with(':') {
                return trimmed.to_string();
            }
        }
        return content.lines().next().unwrap_or("").trim().to_string();
    }

    if let Some(idx) = first_lines.find('{') {
        return first_lines[..idx]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
    }
    if let Some(idx) = first_lines.find("=>") {
        return first_lines[..idx + 2]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
    }
    content.lines().next().unwrap_or("").trim().to_string()
}

fn collect_parameters(node: Node<'_>, source: &str) -> Vec<String> {
    if let Some(list) = node.child_by_field_name("parameters") {
        return named_children(list)
            .into_iter()
            .filter(|p| p.kind() != "comment")
            .map(|p| node_text(p, source).to_string())
            .collect();
    }
    // Single-parameter arrow function: `x => x * 2`.
    node.child_by_field_name("parameter")
        .map(|p| vec![node_text(p, source).to_string()])
        .unwrap_or_default()
}

fn return_type(node: Node<'_>, source: &str) -> Option<String> {
    let annotation = node
        .child_by_field_name("return_type")
        .or_else(|| node.child_by_field_name("result"))?;
    let text = node_text(annotation, source)
        .trim_start_matches(':')
        .trim_start_matches("->")
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Assembles a [`SymbolInfo`] for `node`; callable symbols get their
/// cyclomatic complexity.
pub fn build_symbol(
    node: Node<'_>,
    source: &str,
    name: String,
    symbol_type: SymbolType,
    language: &str,
    profile: &ComplexityProfile,
) -> SymbolInfo {
    let (start_line, end_line) = line_span(node);
    let callable = symbol_type.is_callable();
    SymbolInfo {
        name,
        symbol_type,
        start_line,
        end_line,
        signature: extract_signature(node_text(node, source), language),
        parameters: if callable { collect_parameters(node, source) } else { Vec::new() },
        return_type: if callable { return_type(node, source) } else { None },
        complexity: callable.then(|| calculate_cyclomatic(node, profile)),
    }
}

// ── Whole-subtree collectors ─────────────────────────────────────────

/// Every call site below `node`, de-duplicated by callee key and line.
pub fn collect_call_sites(
    node: Node<'_>,
    source: &str,
    extractor: &dyn SymbolExtractor,
) -> Vec<CallSite> {
    let call_types = extractor.call_expression_types();
    let mut seen = HashSet::new();
    let mut sites = Vec::new();
    for_each_node(node, |n| {
        if n.is_named() && call_types.contains(&n.kind()) {
            if let Some(site) = extractor.extract_call_site(n, source) {
                if seen.insert((site.key.clone(), site.line)) {
                    sites.push(site);
                }
            }
        }
    });
    sites
}

/// Every intra-repository import in the file, merged per import path.
pub fn collect_imports(
    root: Node<'_>,
    source: &str,
    extractor: &dyn ImportExtractor,
) -> Vec<ImportEntry> {
    let import_types = extractor.import_node_types();
    let mut entries: Vec<ImportEntry> = Vec::new();
    for_each_node(root, |n| {
        if !n.is_named() || !import_types.contains(&n.kind()) {
            return;
        }
        for entry in extractor.import_entries(n, source) {
            match entries.iter_mut().find(|e| e.import_path == entry.import_path) {
                Some(existing) => {
                    for symbol in entry.symbols {
                        if !existing.symbols.contains(&symbol) {
                            existing.symbols.push(symbol);
                        }
                    }
                }
                None => entries.push(entry),
            }
        }
    });
    entries
}
