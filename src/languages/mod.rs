//! Language registry and per-language strategy traits.
//!
//! Every supported language is described by one immutable [`LanguageDefinition`]:
//! its extensions, the tree-sitter grammar, the node-type tables the complexity
//! engine needs ([`ComplexityProfile`]) and four strategy objects that the
//! traversal framework and the chunker call into.
//!
//! The process-wide registry is built lazily on first use and never mutated
//! afterwards.
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use thiserror::Error;
use tree_sitter::{Language, Node};

use crate::indexer::symbols::{CallSite, ImportEntry, SymbolInfo, node_text};

pub mod go;
pub mod python;
pub mod rust;
pub mod typescript;

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("language already registered: {0}")]
    DuplicateLanguage(String),

    #[error("extension .{extension} already claimed by {owner}")]
    DuplicateExtension { extension: String, owner: String },
}

// ── Node-type tables ─────────────────────────────────────────────────

/// Grammar-specific node-type tables consumed by the complexity engine.
///
/// The entries are tied to the tree-sitter grammar version in use; a wrong
/// entry silently changes scores, so they are kept as literal data per
/// language rather than derived.
#[derive(Debug)]
pub struct ComplexityProfile {
    /// Node types that add one path to cyclomatic complexity.
    pub decision_points: &'static [&'static str],
    /// Control-flow nodes that cost `1 + nesting` and nest their children.
    pub nesting_types: &'static [&'static str],
    /// Nodes that cost a flat `+1` (else, ternary, ...).
    pub non_nesting_types: &'static [&'static str],
    /// Closures and anonymous functions.
    pub lambda_types: &'static [&'static str],
    /// Expression nodes that may carry a logical operator.
    pub logical_expression_types: &'static [&'static str],
    /// Operator tokens treated as logical (`&&`, `and`, ...).
    pub logical_operators: &'static [&'static str],
    /// Halstead operator tokens.
    pub operator_symbols: &'static [&'static str],
    /// Halstead operator keywords.
    pub operator_keywords: &'static [&'static str],
}

impl ComplexityProfile {
    pub fn is_decision_point(&self, kind: &str) -> bool {
        self.decision_points.contains(&kind)
    }

    pub fn is_operator_text(&self, text: &str) -> bool {
        self.operator_symbols.contains(&text) || self.operator_keywords.contains(&text)
    }

    /// Returns the logical operator of `node` if it is a logical expression.
    pub fn logical_operator(&self, node: Node<'_>) -> Option<&'static str> {
        if !self.logical_expression_types.contains(&node.kind()) {
            return None;
        }
        let operator = node.child_by_field_name("operator")?.kind();
        self.logical_operators
            .iter()
            .copied()
            .find(|op| *op == operator)
    }
}

// ── Strategy traits ──────────────────────────────────────────────────

/// Predicates driving the generic symbol traversal.
pub trait Traverser: Send + Sync {
    /// Function/method-like nodes that become symbol chunks.
    fn target_node_types(&self) -> &'static [&'static str];

    /// Class-like nodes whose body holds further targets.
    fn container_types(&self) -> &'static [&'static str];

    /// Wrapper nodes (file root, export wrapper, namespace) walked through.
    fn should_traverse_children(&self, node: Node<'_>) -> bool;

    fn is_target(&self, node: Node<'_>) -> bool {
        node.is_named() && self.target_node_types().contains(&node.kind())
    }

    fn is_container(&self, node: Node<'_>) -> bool {
        node.is_named() && self.container_types().contains(&node.kind())
    }

    fn container_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("body")
    }

    fn container_name(&self, node: Node<'_>, source: &str) -> Option<String> {
        node.child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
    }

    /// A container is split into its members only when it has any.
    fn should_extract_children(&self, node: Node<'_>) -> bool {
        self.container_body(node)
            .is_some_and(|body| self.has_extractable(body))
    }

    fn has_extractable(&self, node: Node<'_>) -> bool {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        children.into_iter().any(|child| {
            self.is_target(child)
                || self.is_container(child)
                || self.is_declaration_with_function(child)
                || (self.should_traverse_children(child) && self.has_extractable(child))
        })
    }

    /// Node whose lines form the chunk of `node`, such as a wrapper that
    /// carries its decorators.
    fn chunk_span<'t>(&self, node: Node<'t>) -> Node<'t> {
        node
    }

    /// Owning type of a target declared outside any container (Go methods
    /// name their receiver).
    fn owner_name(&self, _node: Node<'_>, _source: &str) -> Option<String> {
        None
    }

    /// A binding whose initializer is a function (`const f = () => {}`).
    fn is_declaration_with_function(&self, _node: Node<'_>) -> bool {
        false
    }

    /// The bound name and the embedded function node of such a declaration.
    fn function_in_declaration<'t>(
        &self,
        _node: Node<'t>,
        _source: &str,
    ) -> Option<(String, Node<'t>)> {
        None
    }
}

/// Public surface of a file.
pub trait ExportExtractor: Send + Sync {
    /// Ordered, de-duplicated exported names.
    fn extract_exports(&self, root: Node<'_>, source: &str) -> Vec<String>;
}

/// Intra-repository import edges.
pub trait ImportExtractor: Send + Sync {
    fn import_node_types(&self) -> &'static [&'static str];

    /// The imported path, or `None` for standard-library / external imports.
    fn extract_import_path(&self, node: Node<'_>, source: &str) -> Option<String>;

    /// The import path with the locally bound symbol names.
    fn process_import_symbols(&self, node: Node<'_>, source: &str) -> Option<ImportEntry>;

    /// All entries of one import node; statements importing several modules
    /// at once override this.
    fn import_entries(&self, node: Node<'_>, source: &str) -> Vec<ImportEntry> {
        self.process_import_symbols(node, source)
            .into_iter()
            .collect()
    }
}

/// Declarations and call sites.
pub trait SymbolExtractor: Send + Sync {
    fn extract_symbol(
        &self,
        node: Node<'_>,
        source: &str,
        parent_class: Option<&str>,
    ) -> Option<SymbolInfo>;

    fn call_expression_types(&self) -> &'static [&'static str];

    fn extract_call_site(&self, node: Node<'_>, source: &str) -> Option<CallSite>;
}

// ── Definition ───────────────────────────────────────────────────────

pub struct LanguageDefinition {
    pub id: &'static str,
    pub display_name: &'static str,
    pub extensions: &'static [&'static str],
    grammar: fn() -> Language,
    dialects: Vec<(&'static str, fn() -> Language)>,
    pub complexity: &'static ComplexityProfile,
    pub traverser: Box<dyn Traverser>,
    pub exports: Box<dyn ExportExtractor>,
    pub imports: Box<dyn ImportExtractor>,
    pub symbols: Box<dyn SymbolExtractor>,
}

impl LanguageDefinition {
    pub fn new(
        id: &'static str,
        extensions: &'static [&'static str],
        grammar: fn() -> Language,
        complexity: &'static ComplexityProfile,
    ) -> LanguageDefinitionBuilder {
        LanguageDefinitionBuilder {
            id,
            display_name: id,
            extensions,
            grammar,
            dialects: Vec::new(),
            complexity,
        }
    }

    pub fn grammar(&self) -> Language {
        (self.grammar)()
    }

    /// Grammar for `path`, honoring per-extension dialects (TSX).
    pub fn grammar_for(&self, path: &Path) -> Language {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        self.dialects
            .iter()
            .find(|(dialect, _)| ext.as_deref() == Some(*dialect))
            .map(|(_, grammar)| grammar())
            .unwrap_or_else(|| self.grammar())
    }
}

impl std::fmt::Debug for LanguageDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageDefinition")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

pub struct LanguageDefinitionBuilder {
    id: &'static str,
    display_name: &'static str,
    extensions: &'static [&'static str],
    grammar: fn() -> Language,
    dialects: Vec<(&'static str, fn() -> Language)>,
    complexity: &'static ComplexityProfile,
}

impl LanguageDefinitionBuilder {
    pub fn display_name(mut self, name: &'static str) -> Self {
        self.display_name = name;
        self
    }

    /// Uses `grammar` for files with extension `ext`.
    pub fn dialect(mut self, ext: &'static str, grammar: fn() -> Language) -> Self {
        self.dialects.push((ext, grammar));
        self
    }

    pub fn strategies(
        self,
        traverser: impl Traverser + 'static,
        exports: impl ExportExtractor + 'static,
        imports: impl ImportExtractor + 'static,
        symbols: impl SymbolExtractor + 'static,
    ) -> LanguageDefinition {
        LanguageDefinition {
            id: self.id,
            display_name: self.display_name,
            extensions: self.extensions,
            grammar: self.grammar,
            dialects: self.dialects,
            complexity: self.complexity,
            traverser: Box::new(traverser),
            exports: Box::new(exports),
            imports: Box::new(imports),
            symbols: Box::new(symbols),
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDefinition>,
    by_id: HashMap<&'static str, usize>,
    by_extension: HashMap<String, usize>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in language.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for definition in builtin_definitions() {
            if let Err(e) = registry.register(definition) {
                tracing::error!("Skipping built-in language: {e}");
            }
        }
        registry
    }

    /// Adds a language. Fails without side effects if its id or any of its
    /// extensions is already claimed.
    pub fn register(&mut self, definition: LanguageDefinition) -> Result<(), RegistryError> {
        if self.by_id.contains_key(definition.id) {
            return Err(RegistryError::DuplicateLanguage(definition.id.to_string()));
        }
        for ext in definition.extensions {
            if let Some(&owner) = self.by_extension.get(&ext.to_ascii_lowercase()) {
                return Err(RegistryError::DuplicateExtension {
                    extension: ext.to_string(),
                    owner: self.languages[owner].id.to_string(),
                });
            }
        }

        let index = self.languages.len();
        self.by_id.insert(definition.id, index);
        for ext in definition.extensions {
            self.by_extension.insert(ext.to_ascii_lowercase(), index);
        }
        self.languages.push(definition);
        Ok(())
    }

    pub fn detect_language(&self, path: &Path) -> Option<&LanguageDefinition> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension
            .get(&ext)
            .map(|&index| &self.languages[index])
    }

    pub fn get(&self, id: &str) -> Option<&LanguageDefinition> {
        self.by_id.get(id).map(|&index| &self.languages[index])
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageDefinition> {
        self.languages.iter()
    }

    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&ext.to_ascii_lowercase())
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

fn builtin_definitions() -> Vec<LanguageDefinition> {
    vec![
        typescript::typescript_definition(),
        typescript::javascript_definition(),
        python::python_definition(),
        go::go_definition(),
        rust::rust_definition(),
    ]
}

static REGISTRY: LazyLock<LanguageRegistry> = LazyLock::new(LanguageRegistry::with_builtin);

/// The process-wide registry of built-in languages.
pub fn registry() -> &'static LanguageRegistry {
    &REGISTRY
}

/// Union of one node-type table across every registered language.
fn union_of(table: impl Fn(&ComplexityProfile) -> &'static [&'static str]) -> HashSet<&'static str> {
    registry()
        .languages()
        .flat_map(|lang| table(lang.complexity).iter().copied())
        .collect()
}

static ALL_LAMBDA_TYPES: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| union_of(|p| p.lambda_types));

/// Closure node types of every registered language.
pub fn all_lambda_types() -> &'static HashSet<&'static str> {
    &ALL_LAMBDA_TYPES
}

/// Convenience lookup against the process-wide registry.
pub fn detect_language(path: &Path) -> Option<&'static LanguageDefinition> {
    registry().detect_language(path)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_by_extension() {
        let reg = registry();
        assert_eq!(reg.detect_language(Path::new("src/app.ts")).unwrap().id, "typescript");
        assert_eq!(reg.detect_language(Path::new("src/App.TSX")).unwrap().id, "typescript");
        assert_eq!(reg.detect_language(Path::new("lib/index.mjs")).unwrap().id, "javascript");
        assert_eq!(reg.detect_language(Path::new("pkg/main.go")).unwrap().id, "go");
        assert_eq!(reg.detect_language(Path::new("tool.py")).unwrap().id, "python");
        assert_eq!(reg.detect_language(Path::new("src/lib.rs")).unwrap().id, "rust");
        assert_eq!(reg.detect_language(Path::new("src/lib.rs")).unwrap().display_name, "Rust");
        assert!(reg.detect_language(Path::new("README.md")).is_none());
        assert!(reg.detect_language(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut reg = LanguageRegistry::new();
        reg.register(go::go_definition()).unwrap();
        let err = reg.register(go::go_definition()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateLanguage("go".to_string()));
    }

    #[test]
    fn test_register_rejects_claimed_extension() {
        let mut reg = LanguageRegistry::new();
        reg.register(typescript::typescript_definition()).unwrap();

        // Same extensions under a different id.
        let impostor = LanguageDefinition::new(
            "typescript-next",
            &["tsx"],
            || tree_sitter_typescript::LANGUAGE_TSX.into(),
            &typescript::ECMASCRIPT_COMPLEXITY,
        )
        .strategies(
            typescript::EcmaTraverser,
            typescript::EcmaExports,
            typescript::EcmaImports,
            typescript::EcmaSymbols::new("typescript"),
        );

        let err = reg.register(impostor).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateExtension { ref owner, .. } if owner == "typescript"));
        assert!(reg.get("typescript-next").is_none());
    }

    #[test]
    fn test_lambda_union_spans_languages() {
        let lambdas = all_lambda_types();
        for kind in ["arrow_function", "lambda", "func_literal", "closure_expression"] {
            assert!(lambdas.contains(kind), "{kind}");
        }
        assert!(!lambdas.contains("function_declaration"));
    }

    #[test]
    fn test_builtin_registry_is_complete() {
        let ids: Vec<&str> = registry().languages().map(|l| l.id).collect();
        assert_eq!(ids, vec!["typescript", "javascript", "python", "go", "rust"]);
        assert!(registry().supports_extension("RS"));
        assert!(registry().supported_extensions().contains(&"cjs"));
    }
}
