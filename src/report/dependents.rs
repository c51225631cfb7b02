//! Reverse-import index: which files import a given file.
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::indexer::chunk::Chunk;
use crate::report::{DependentComplexity, round1};

const ECMA_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Directory part of a root-relative path (`""` for top-level files).
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Joins `relative` onto `dir`, folding `.` and `..` segments. `None` when
/// the path climbs above the root.
fn join_normalized(dir: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn first_known(candidates: impl IntoIterator<Item = String>, known: &BTreeSet<String>) -> Vec<String> {
    candidates
        .into_iter()
        .find(|c| known.contains(c))
        .into_iter()
        .collect()
}

/// Known files equal to `candidate` or ending with `/candidate`.
fn suffix_matches(candidate: &str, known: &BTreeSet<String>) -> Vec<String> {
    let tail = format!("/{candidate}");
    known
        .iter()
        .filter(|k| *k == candidate || k.ends_with(&tail))
        .cloned()
        .collect()
}

fn ecma_candidates(base: &str) -> Vec<String> {
    let mut out = vec![base.to_string()];
    // `./util.js` in TypeScript sources refers to `util.ts`.
    if let Some(stem) = base.strip_suffix(".js") {
        out.push(format!("{stem}.ts"));
        out.push(format!("{stem}.tsx"));
    }
    out.extend(ECMA_EXTENSIONS.iter().map(|ext| format!("{base}.{ext}")));
    out.extend(ECMA_EXTENSIONS.iter().map(|ext| format!("{base}/index.{ext}")));
    out
}

fn resolve_ecma(from: &str, import_path: &str, known: &BTreeSet<String>) -> Vec<String> {
    if let Some(alias) = import_path
        .strip_prefix("@/")
        .or_else(|| import_path.strip_prefix("~/"))
    {
        for candidate in ecma_candidates(alias) {
            let mut found = suffix_matches(&candidate, known);
            if !found.is_empty() {
                found.truncate(1);
                return found;
            }
        }
        return Vec::new();
    }
    let base = if import_path.starts_with('/') {
        join_normalized("", import_path)
    } else {
        join_normalized(parent_dir(from), import_path)
    };
    match base {
        Some(base) => first_known(ecma_candidates(&base), known),
        None => Vec::new(),
    }
}

fn resolve_python(from: &str, import_path: &str, known: &BTreeSet<String>) -> Vec<String> {
    let dots = import_path.chars().take_while(|c| *c == '.').count();
    let module = import_path[dots..].replace('.', "/");

    if dots > 0 {
        let mut dir = parent_dir(from).to_string();
        for _ in 1..dots {
            dir = parent_dir(&dir).to_string();
        }
        let Some(base) = join_normalized(&dir, &module) else {
            return Vec::new();
        };
        let init = if base.is_empty() {
            "__init__.py".to_string()
        } else {
            format!("{base}/__init__.py")
        };
        return first_known([format!("{base}.py"), init], known);
    }

    // Absolute module: the importing file's package first, then anywhere.
    let local = join_normalized(parent_dir(from), &module);
    let mut candidates: Vec<String> = Vec::new();
    if let Some(local) = local {
        candidates.push(format!("{local}.py"));
        candidates.push(format!("{local}/__init__.py"));
    }
    candidates.push(format!("{module}.py"));
    candidates.push(format!("{module}/__init__.py"));
    let direct = first_known(candidates, known);
    if !direct.is_empty() {
        return direct;
    }
    let mut found = suffix_matches(&format!("{module}.py"), known);
    if found.is_empty() {
        found = suffix_matches(&format!("{module}/__init__.py"), known);
    }
    found.truncate(1);
    found
}

/// Directory holding the module tree `from` belongs to, i.e. the directory
/// of the nearest `lib.rs` or `main.rs`.
fn rust_crate_root(from: &str, known: &BTreeSet<String>) -> String {
    let mut dir = parent_dir(from).to_string();
    loop {
        let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };
        if known.contains(&format!("{prefix}lib.rs")) || known.contains(&format!("{prefix}main.rs")) {
            return dir;
        }
        if dir.is_empty() {
            break;
        }
        dir = parent_dir(&dir).to_string();
    }
    // No crate root indexed: fall back to the `src` directory on the path.
    match from.find("src/") {
        Some(idx) => from[..idx + 3].to_string(),
        None => parent_dir(from).to_string(),
    }
}

/// Directory that holds the child modules of `file`.
fn rust_module_dir(file: &str) -> String {
    let dir = parent_dir(file);
    let name = file.rsplit('/').next().unwrap_or(file);
    match name {
        "mod.rs" | "lib.rs" | "main.rs" => dir.to_string(),
        other => {
            let stem = other.trim_end_matches(".rs");
            if dir.is_empty() {
                stem.to_string()
            } else {
                format!("{dir}/{stem}")
            }
        }
    }
}

fn resolve_rust(from: &str, import_path: &str, known: &BTreeSet<String>) -> Vec<String> {
    let mut segments: Vec<&str> = import_path.split("::").filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Vec::new();
    }
    let mut base = match segments[0] {
        "crate" => rust_crate_root(from, known),
        "self" => rust_module_dir(from),
        "super" => parent_dir(&rust_module_dir(from)).to_string(),
        _ => return Vec::new(),
    };
    segments.remove(0);
    while segments.first() == Some(&"super") {
        base = parent_dir(&base).to_string();
        segments.remove(0);
    }

    // Longest module prefix wins; trailing segments name items.
    for len in (1..=segments.len()).rev() {
        let joined = segments[..len].join("/");
        let module = if base.is_empty() { joined } else { format!("{base}/{joined}") };
        let found = first_known([format!("{module}.rs"), format!("{module}/mod.rs")], known);
        if !found.is_empty() {
            return found;
        }
    }
    // Every segment names an item of the base module itself.
    let prefix = if base.is_empty() { String::new() } else { format!("{base}/") };
    first_known(
        [
            format!("{base}.rs"),
            format!("{prefix}mod.rs"),
            format!("{prefix}lib.rs"),
            format!("{prefix}main.rs"),
        ],
        known,
    )
}

fn resolve_go(import_path: &str, known: &BTreeSet<String>) -> Vec<String> {
    let mut best: Option<&str> = None;
    for file in known.iter().filter(|k| k.ends_with(".go")) {
        let dir = parent_dir(file);
        if dir.is_empty() {
            continue;
        }
        let matches = import_path == dir || import_path.ends_with(&format!("/{dir}"));
        if matches && best.is_none_or(|b| dir.len() > b.len()) {
            best = Some(dir);
        }
    }
    let Some(dir) = best else {
        return Vec::new();
    };
    known
        .iter()
        .filter(|k| parent_dir(k) == dir && k.ends_with(".go") && !k.ends_with("_test.go"))
        .cloned()
        .collect()
}

/// Files in `known` that `import_path`, written in `from`, refers to.
pub fn resolve_import(
    from: &str,
    language: &str,
    import_path: &str,
    known: &BTreeSet<String>,
) -> Vec<String> {
    match language {
        "typescript" | "javascript" => resolve_ecma(from, import_path, known),
        "python" => resolve_python(from, import_path, known),
        "rust" => resolve_rust(from, import_path, known),
        "go" => resolve_go(import_path, known),
        _ => Vec::new(),
    }
}

#[derive(Debug, Default)]
pub struct DependencyIndex {
    dependents: BTreeMap<String, BTreeSet<String>>,
    /// Cyclomatic complexity of every function chunk, per file.
    complexity: BTreeMap<String, Vec<u32>>,
}

impl DependencyIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let known: BTreeSet<String> = chunks.iter().map(|c| c.metadata.file.clone()).collect();

        // file -> (language, import paths)
        let mut imports: BTreeMap<&str, (&str, BTreeSet<&str>)> = BTreeMap::new();
        let mut complexity: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for chunk in chunks {
            let meta = &chunk.metadata;
            let entry = imports
                .entry(meta.file.as_str())
                .or_insert_with(|| (meta.language.as_str(), BTreeSet::new()));
            entry.1.extend(meta.imports.iter().map(String::as_str));
            if let (true, Some(value)) = (chunk.is_callable(), meta.complexity) {
                complexity.entry(meta.file.clone()).or_default().push(value);
            }
        }

        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (file, (language, paths)) in &imports {
            for path in paths {
                for target in resolve_import(file, language, path, &known) {
                    if target != *file {
                        dependents.entry(target).or_default().insert(file.to_string());
                    }
                }
            }
        }
        debug!(
            "Dependency index: {} files, {} with dependents",
            known.len(),
            dependents.len()
        );
        Self {
            dependents,
            complexity,
        }
    }

    /// Files importing `file`, sorted.
    pub fn dependents_of(&self, file: &str) -> Vec<String> {
        self.dependents
            .get(file)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Cyclomatic figures over every function in the dependents of `file`.
    pub fn dependent_complexity(&self, file: &str) -> Option<DependentComplexity> {
        let values: Vec<u32> = self
            .dependents
            .get(file)?
            .iter()
            .filter_map(|dependent| self.complexity.get(dependent))
            .flatten()
            .copied()
            .collect();
        let max = *values.iter().max()?;
        let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
        Some(DependentComplexity {
            average: round1(sum as f64 / values.len() as f64),
            max,
        })
    }

    /// Cyclomatic values of the function chunks of `file`.
    pub fn file_complexity(&self, file: &str) -> &[u32] {
        self.complexity.get(file).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::chunk::{ChunkMetadata, ChunkType};
    use crate::indexer::symbols::SymbolType;

    fn known(files: &[&str]) -> BTreeSet<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_resolve_relative_typescript() {
        let files = known(&["src/a.ts", "src/lib/util.ts", "src/components/index.tsx", "src/b.ts"]);
        assert_eq!(resolve_import("src/a.ts", "typescript", "./lib/util", &files), vec!["src/lib/util.ts"]);
        assert_eq!(resolve_import("src/a.ts", "typescript", "./lib/util.js", &files), vec!["src/lib/util.ts"]);
        assert_eq!(resolve_import("src/lib/util.ts", "typescript", "../b", &files), vec!["src/b.ts"]);
        assert_eq!(resolve_import("src/a.ts", "typescript", "./components", &files), vec!["src/components/index.tsx"]);
        assert_eq!(resolve_import("src/a.ts", "typescript", "@/lib/util", &files), vec!["src/lib/util.ts"]);
        assert!(resolve_import("src/a.ts", "typescript", "./missing", &files).is_empty());
        assert!(resolve_import("a.ts", "typescript", "../../outside", &files).is_empty());
    }

    #[test]
    fn test_resolve_python_modules() {
        let files = known(&["app/main.py", "app/models/__init__.py", "app/models/user.py", "app/utils.py"]);
        assert_eq!(resolve_import("app/main.py", "python", ".utils", &files), vec!["app/utils.py"]);
        assert_eq!(resolve_import("app/models/user.py", "python", "..utils", &files), vec!["app/utils.py"]);
        assert_eq!(resolve_import("app/main.py", "python", ".models", &files), vec!["app/models/__init__.py"]);
        assert_eq!(resolve_import("app/main.py", "python", "app.models.user", &files), vec!["app/models/user.py"]);
        assert_eq!(resolve_import("app/main.py", "python", "models.user", &files), vec!["app/models/user.py"]);
    }

    #[test]
    fn test_resolve_rust_paths() {
        let files = known(&["src/lib.rs", "src/db/mod.rs", "src/db/chunks.rs", "src/config.rs"]);
        assert_eq!(resolve_import("src/db/chunks.rs", "rust", "crate::config::Config", &files), vec!["src/config.rs"]);
        assert_eq!(resolve_import("src/config.rs", "rust", "crate::db::chunks::thing", &files), vec!["src/db/chunks.rs"]);
        assert_eq!(resolve_import("src/config.rs", "rust", "crate::db::Db", &files), vec!["src/db/mod.rs"]);
        assert_eq!(resolve_import("src/db/chunks.rs", "rust", "super::Db", &files), vec!["src/db/mod.rs"]);
        assert_eq!(resolve_import("src/db/mod.rs", "rust", "self::chunks", &files), vec!["src/db/chunks.rs"]);
    }

    #[test]
    fn test_resolve_go_package() {
        let files = known(&["cmd/main.go", "internal/store/db.go", "internal/store/cache.go", "internal/store/db_test.go"]);
        let found = resolve_import("cmd/main.go", "go", "github.com/acme/app/internal/store", &files);
        assert_eq!(found, vec!["internal/store/cache.go", "internal/store/db.go"]);
        assert!(resolve_import("cmd/main.go", "go", "github.com/other/lib", &files).is_empty());
    }

    fn chunk(file: &str, imports: &[&str], complexity: Option<u32>) -> Chunk {
        let mut meta = ChunkMetadata::new(file, 1, 5, ChunkType::Function, "typescript");
        meta.symbol_name = Some("f".into());
        meta.symbol_type = Some(SymbolType::Function);
        meta.complexity = complexity;
        meta.imports = imports.iter().map(|s| s.to_string()).collect();
        Chunk {
            content: String::new(),
            metadata: meta,
        }
    }

    #[test]
    fn test_dependency_index() {
        let chunks = vec![
            chunk("src/util.ts", &[], Some(2)),
            chunk("src/a.ts", &["./util"], Some(4)),
            chunk("src/b.ts", &["./util"], Some(9)),
            chunk("src/b.ts", &["./util"], Some(1)),
        ];
        let index = DependencyIndex::build(&chunks);
        assert_eq!(index.dependents_of("src/util.ts"), vec!["src/a.ts", "src/b.ts"]);
        assert!(index.dependents_of("src/a.ts").is_empty());

        let complexity = index.dependent_complexity("src/util.ts").unwrap();
        assert_eq!(complexity.max, 9);
        assert_eq!(complexity.average, 4.7);
        assert_eq!(index.dependent_complexity("src/a.ts"), None);
        assert_eq!(index.file_complexity("src/b.ts"), &[9, 1]);
    }
}
