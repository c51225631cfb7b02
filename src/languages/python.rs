use tree_sitter::Node;

use super::{
    ComplexityProfile, ExportExtractor, ImportExtractor, LanguageDefinition, SymbolExtractor,
    Traverser,
};
use crate::indexer::symbols::{
    CallSite, ImportEntry, SymbolInfo, SymbolType, build_symbol, dedupe_preserving_order,
    field_text, named_children, node_text, unquote,
};

pub static PYTHON_COMPLEXITY: ComplexityProfile = ComplexityProfile {
    decision_points: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "for_in_clause",
        "if_clause",
        "case_clause",
        "and",
        "or",
    ],
    nesting_types: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "except_clause",
        "match_statement",
    ],
    non_nesting_types: &["elif_clause", "else_clause", "conditional_expression"],
    lambda_types: &["lambda"],
    logical_expression_types: &["boolean_operator"],
    logical_operators: &["and", "or"],
    operator_symbols: &[
        "=", "+=", "-=", "*=", "/=", "//=", "%=", "**=", "&=", "|=", "^=", ">>=", "<<=", "@=",
        ":=", "+", "-", "*", "/", "//", "%", "**", "@", "==", "!=", "<", ">", "<=", ">=", "&",
        "|", "^", "~", "<<", ">>", ".", ",", ":", "->",
    ],
    operator_keywords: &[
        "and", "or", "not", "in", "is", "if", "elif", "else", "for", "while", "try", "except",
        "finally", "with", "as", "return", "yield", "raise", "break", "continue", "pass", "del",
        "global", "nonlocal", "assert", "await", "async", "lambda", "def", "class", "import",
        "from", "match", "case",
    ],
};

/// Top-level standard-library modules. Imports of these never resolve to a
/// repository file.
const STDLIB_MODULES: &[&str] = &[
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins",
    "bz2", "calendar", "cmath", "collections", "concurrent", "configparser", "contextlib",
    "contextvars", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal", "difflib",
    "dis", "email", "enum", "errno", "fnmatch", "fractions", "functools", "gc", "getpass",
    "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "logging", "lzma", "math", "mimetypes",
    "multiprocessing", "numbers", "operator", "os", "pathlib", "pickle", "platform", "pprint",
    "queue", "random", "re", "secrets", "select", "shlex", "shutil", "signal", "socket",
    "sqlite3", "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys",
    "tempfile", "textwrap", "threading", "time", "timeit", "tomllib", "traceback", "types",
    "typing", "unicodedata", "unittest", "urllib", "uuid", "warnings", "weakref", "xml",
    "zipfile", "zlib", "zoneinfo",
];

pub fn python_definition() -> LanguageDefinition {
    LanguageDefinition::new(
        "python",
        &["py", "pyi"],
        || tree_sitter_python::LANGUAGE.into(),
        &PYTHON_COMPLEXITY,
    )
    .display_name("Python")
    .strategies(PythonTraverser, PythonExports, PythonImports, PythonSymbols)
}

// ── Traversal ────────────────────────────────────────────────────────

pub struct PythonTraverser;

/// `name = lambda ...`
fn lambda_assignment(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    if node.kind() != "expression_statement" {
        return None;
    }
    let assignment = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "assignment")?;
    let left = assignment
        .child_by_field_name("left")
        .filter(|l| l.kind() == "identifier")?;
    let right = assignment
        .child_by_field_name("right")
        .filter(|r| r.kind() == "lambda")?;
    Some((left, right))
}

impl Traverser for PythonTraverser {
    fn target_node_types(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn container_types(&self) -> &'static [&'static str] {
        &["class_definition"]
    }

    fn should_traverse_children(&self, node: Node<'_>) -> bool {
        matches!(node.kind(), "module" | "decorated_definition")
    }

    fn chunk_span<'t>(&self, node: Node<'t>) -> Node<'t> {
        node.parent()
            .filter(|p| p.kind() == "decorated_definition")
            .unwrap_or(node)
    }

    fn is_declaration_with_function(&self, node: Node<'_>) -> bool {
        lambda_assignment(node).is_some()
    }

    fn function_in_declaration<'t>(
        &self,
        node: Node<'t>,
        source: &str,
    ) -> Option<(String, Node<'t>)> {
        let (name, lambda) = lambda_assignment(node)?;
        Some((node_text(name, source).to_string(), lambda))
    }
}

// ── Exports ──────────────────────────────────────────────────────────

pub struct PythonExports;

/// Entries of `__all__ = [...]`, if the module declares it.
fn dunder_all(root: Node<'_>, source: &str) -> Option<Vec<String>> {
    for statement in named_children(root) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = named_children(statement)
            .into_iter()
            .find(|c| c.kind() == "assignment")
        else {
            continue;
        };
        let is_all = assignment
            .child_by_field_name("left")
            .is_some_and(|l| node_text(l, source) == "__all__");
        if !is_all {
            continue;
        }
        let right = assignment.child_by_field_name("right")?;
        let names = named_children(right)
            .into_iter()
            .filter(|item| item.kind() == "string")
            .map(|item| unquote(node_text(item, source)))
            .collect();
        return Some(names);
    }
    None
}

impl ExportExtractor for PythonExports {
    fn extract_exports(&self, root: Node<'_>, source: &str) -> Vec<String> {
        if let Some(names) = dunder_all(root, source) {
            return dedupe_preserving_order(names);
        }

        let mut names = Vec::new();
        for statement in named_children(root) {
            let definition = if statement.kind() == "decorated_definition" {
                statement.child_by_field_name("definition")
            } else {
                Some(statement)
            };
            let Some(definition) = definition else { continue };
            match definition.kind() {
                "function_definition" | "class_definition" => {
                    names.extend(field_text(definition, "name", source));
                }
                "expression_statement" => {
                    for assignment in named_children(definition) {
                        if assignment.kind() != "assignment" {
                            continue;
                        }
                        if let Some(left) = assignment
                            .child_by_field_name("left")
                            .filter(|l| l.kind() == "identifier")
                        {
                            names.push(node_text(left, source).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        // Leading underscore marks module-private names.
        dedupe_preserving_order(names.into_iter().filter(|n| !n.starts_with('_')))
    }
}

// ── Imports ──────────────────────────────────────────────────────────

pub struct PythonImports;

fn is_local_module(module: &str) -> bool {
    if module.starts_with('.') {
        return true;
    }
    let root = module.split('.').next().unwrap_or(module);
    !STDLIB_MODULES.contains(&root)
}

/// Dotted name and locally bound name of an `import` / `from` name item.
fn import_name(item: Node<'_>, source: &str, from_import: bool) -> Option<(String, String)> {
    match item.kind() {
        "dotted_name" => {
            let dotted = node_text(item, source).to_string();
            let bound = if from_import {
                dotted.rsplit('.').next().unwrap_or(&dotted).to_string()
            } else {
                // `import pkg.mod` binds `pkg`.
                dotted.split('.').next().unwrap_or(&dotted).to_string()
            };
            Some((dotted, bound))
        }
        "aliased_import" => {
            let dotted = field_text(item, "name", source)?;
            let alias = field_text(item, "alias", source)?;
            Some((dotted, alias))
        }
        _ => None,
    }
}

impl ImportExtractor for PythonImports {
    fn import_node_types(&self) -> &'static [&'static str] {
        &["import_statement", "import_from_statement"]
    }

    fn extract_import_path(&self, node: Node<'_>, source: &str) -> Option<String> {
        let module = match node.kind() {
            "import_from_statement" => field_text(node, "module_name", source)?,
            _ => {
                let mut cursor = node.walk();
                let first = node.children_by_field_name("name", &mut cursor).next()?;
                import_name(first, source, false)?.0
            }
        };
        is_local_module(&module).then_some(module)
    }

    fn process_import_symbols(&self, node: Node<'_>, source: &str) -> Option<ImportEntry> {
        self.import_entries(node, source).into_iter().next()
    }

    fn import_entries(&self, node: Node<'_>, source: &str) -> Vec<ImportEntry> {
        let mut cursor = node.walk();
        let items: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();

        if node.kind() == "import_from_statement" {
            let Some(import_path) = self.extract_import_path(node, source) else {
                return Vec::new();
            };
            let mut symbols: Vec<String> = items
                .into_iter()
                .filter_map(|item| import_name(item, source, true).map(|(_, bound)| bound))
                .collect();
            if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
                symbols.push("*".to_string());
            }
            return vec![ImportEntry {
                import_path,
                symbols: dedupe_preserving_order(symbols),
            }];
        }

        // `import a.b, c as d` imports several modules at once.
        items
            .into_iter()
            .filter_map(|item| import_name(item, source, false))
            .filter(|(module, _)| is_local_module(module))
            .map(|(import_path, bound)| ImportEntry {
                import_path,
                symbols: vec![bound],
            })
            .collect()
    }
}

// ── Symbols ──────────────────────────────────────────────────────────

pub struct PythonSymbols;

impl SymbolExtractor for PythonSymbols {
    fn extract_symbol(
        &self,
        node: Node<'_>,
        source: &str,
        parent_class: Option<&str>,
    ) -> Option<SymbolInfo> {
        let symbol_type = match node.kind() {
            "function_definition" | "lambda" if parent_class.is_some() => SymbolType::Method,
            "function_definition" | "lambda" => SymbolType::Function,
            "class_definition" => SymbolType::Class,
            _ => return None,
        };
        let name = field_text(node, "name", source).unwrap_or_else(|| "lambda".to_string());
        Some(build_symbol(
            node,
            source,
            name,
            symbol_type,
            "python",
            &PYTHON_COMPLEXITY,
        ))
    }

    fn call_expression_types(&self) -> &'static [&'static str] {
        &["call"]
    }

    fn extract_call_site(&self, node: Node<'_>, source: &str) -> Option<CallSite> {
        let callee = node.child_by_field_name("function")?;
        let symbol = match callee.kind() {
            "identifier" => node_text(callee, source).to_string(),
            "attribute" => field_text(callee, "attribute", source)?,
            _ => return None,
        };
        Some(CallSite {
            symbol,
            line: node.start_position().row + 1,
            key: node_text(callee, source).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::parse_source;
    use crate::indexer::symbols::collect_imports;
    use crate::languages::registry;

    fn with_root<R>(src: &str, f: impl FnOnce(Node<'_>) -> R) -> R {
        let def = registry().get("python").unwrap();
        let tree = parse_source(src, def).unwrap();
        f(tree.root_node())
    }

    #[test]
    fn test_imports_skip_stdlib() {
        let src = "import os\nfrom typing import List\nimport app.models as m, helpers\nfrom .services import UserService, build as make\nfrom ..core import *\n";
        let imports = with_root(src, |root| collect_imports(root, src, &PythonImports));
        assert_eq!(
            imports,
            vec![
                ImportEntry { import_path: "app.models".into(), symbols: vec!["m".into()] },
                ImportEntry { import_path: "helpers".into(), symbols: vec!["helpers".into()] },
                ImportEntry {
                    import_path: ".services".into(),
                    symbols: vec!["UserService".into(), "make".into()],
                },
                ImportEntry { import_path: "..core".into(), symbols: vec!["*".into()] },
            ]
        );
    }

    #[test]
    fn test_exports_honor_dunder_all() {
        let src = "__all__ = [\"public\"]\n\ndef public():\n    pass\n\ndef other():\n    pass\n";
        let exports = with_root(src, |root| PythonExports.extract_exports(root, src));
        assert_eq!(exports, vec!["public"]);
    }

    #[test]
    fn test_exports_without_dunder_all() {
        let src = "VERSION = \"1\"\n\n@dataclass\nclass Point:\n    x: int\n\ndef _private():\n    pass\n\nasync def fetch():\n    pass\n";
        let exports = with_root(src, |root| PythonExports.extract_exports(root, src));
        assert_eq!(exports, vec!["VERSION", "Point", "fetch"]);
    }

    #[test]
    fn test_method_symbol() {
        let src = "class Greeter:\n    def greet(self, name: str) -> str:\n        return name\n";
        with_root(src, |root| {
            let class = named_children(root)[0];
            let body = class.child_by_field_name("body").unwrap();
            let method = named_children(body)[0];
            let info = PythonSymbols.extract_symbol(method, src, Some("Greeter")).unwrap();
            assert_eq!(info.symbol_type, SymbolType::Method);
            assert_eq!(info.name, "greet");
            assert_eq!(info.signature, "def greet(self, name: str) -> str:");
            assert_eq!(info.parameters, vec!["self", "name: str"]);
            assert_eq!(info.return_type.as_deref(), Some("str"));
        });
    }
}
