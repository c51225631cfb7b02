//! Pattern-based symbol names for chunks produced without a syntax tree.
use std::sync::LazyLock;

use regex::Regex;

use crate::indexer::chunk::LineSymbols;
use crate::indexer::symbols::dedupe_preserving_order;

struct SymbolPatterns {
    functions: Vec<Regex>,
    classes: Vec<Regex>,
    interfaces: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static symbol pattern"))
        .collect()
}

static ECMASCRIPT: LazyLock<SymbolPatterns> = LazyLock::new(|| SymbolPatterns {
    functions: compile(&[
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
        r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=]+)?=>",
    ]),
    classes: compile(&[
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
    ]),
    interfaces: compile(&[
        r"(?m)^\s*(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)",
        r"(?m)^\s*(?:export\s+)?type\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*=",
    ]),
});

static PYTHON: LazyLock<SymbolPatterns> = LazyLock::new(|| SymbolPatterns {
    functions: compile(&[r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("]),
    classes: compile(&[r"(?m)^\s*class\s+([A-Za-z_]\w*)"]),
    interfaces: Vec::new(),
});

static GO: LazyLock<SymbolPatterns> = LazyLock::new(|| SymbolPatterns {
    functions: compile(&[r"(?m)^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)"]),
    classes: compile(&[r"(?m)^(?:type\s+|\s+)([A-Za-z_]\w*)\s+struct\b"]),
    interfaces: compile(&[r"(?m)^(?:type\s+|\s+)([A-Za-z_]\w*)\s+interface\b"]),
});

static RUST: LazyLock<SymbolPatterns> = LazyLock::new(|| SymbolPatterns {
    functions: compile(&[
        r#"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+([A-Za-z_]\w*)"#,
    ]),
    classes: compile(&[
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)",
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)",
    ]),
    interfaces: compile(&[r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?trait\s+([A-Za-z_]\w*)"]),
});

/// Loose patterns for files of unknown language.
static GENERIC: LazyLock<SymbolPatterns> = LazyLock::new(|| SymbolPatterns {
    functions: compile(&[r"(?m)^\s*(?:pub\s+|export\s+)?(?:async\s+)?(?:function|def|fn|func)\s+([A-Za-z_$][\w$]*)"]),
    classes: compile(&[r"(?m)^\s*(?:export\s+)?(?:class|struct)\s+([A-Za-z_$][\w$]*)"]),
    interfaces: compile(&[r"(?m)^\s*(?:export\s+)?(?:interface|trait)\s+([A-Za-z_$][\w$]*)"]),
});

fn patterns_for(language: &str) -> &'static SymbolPatterns {
    match language {
        "typescript" | "javascript" => &ECMASCRIPT,
        "python" => &PYTHON,
        "go" => &GO,
        "rust" => &RUST,
        _ => &GENERIC,
    }
}

fn capture_all(patterns: &[Regex], content: &str) -> Vec<String> {
    let mut names: Vec<(usize, String)> = patterns
        .iter()
        .flat_map(|re| {
            re.captures_iter(content)
                .filter_map(|cap| cap.get(1).map(|m| (m.start(), m.as_str().to_string())))
        })
        .collect();
    names.sort_by_key(|(pos, _)| *pos);
    dedupe_preserving_order(names.into_iter().map(|(_, name)| name))
}

/// Function, class and interface names declared in `content`.
pub fn extract_line_symbols(content: &str, language: &str) -> LineSymbols {
    let patterns = patterns_for(language);
    LineSymbols {
        functions: capture_all(&patterns.functions, content),
        classes: capture_all(&patterns.classes, content),
        interfaces: capture_all(&patterns.interfaces, content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typescript_patterns() {
        let src = "export async function load() {}\nconst handler = async (req) => {}\nexport class Service {}\ninterface Options {}\ntype Id = string;\n";
        let symbols = extract_line_symbols(src, "typescript");
        assert_eq!(symbols.functions, vec!["load", "handler"]);
        assert_eq!(symbols.classes, vec!["Service"]);
        assert_eq!(symbols.interfaces, vec!["Options", "Id"]);
    }

    #[test]
    fn test_python_patterns() {
        let src = "class Repo:\n    async def fetch(self):\n        pass\n\ndef main():\n    pass\n";
        let symbols = extract_line_symbols(src, "python");
        assert_eq!(symbols.functions, vec!["fetch", "main"]);
        assert_eq!(symbols.classes, vec!["Repo"]);
        assert!(symbols.interfaces.is_empty());
    }

    #[test]
    fn test_rust_and_go_patterns() {
        let rust = extract_line_symbols("pub(crate) async fn run() {}\npub struct Db;\npub trait Store {}\n", "rust");
        assert_eq!(rust.functions, vec!["run"]);
        assert_eq!(rust.classes, vec!["Db"]);
        assert_eq!(rust.interfaces, vec!["Store"]);

        let go = extract_line_symbols("func (s *Store) Get() {}\ntype Store struct {}\n", "go");
        assert_eq!(go.functions, vec!["Get"]);
        assert_eq!(go.classes, vec!["Store"]);
    }

    #[test]
    fn test_unknown_language_uses_generic_patterns() {
        let symbols = extract_line_symbols("def build():\n  pass\nclass Thing:\n", "text");
        assert_eq!(symbols.functions, vec!["build"]);
        assert_eq!(symbols.classes, vec!["Thing"]);
    }
}
