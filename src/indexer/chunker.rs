use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::complexity::ComplexityMetrics;
use crate::indexer::chunk::{Chunk, ChunkMetadata, ChunkType, HalsteadSummary};
use crate::indexer::heuristics::extract_line_symbols;
use crate::indexer::parser::{ParseError, parse_file};
use crate::indexer::symbols::{
    ImportEntry, collect_call_sites, collect_imports, dedupe_preserving_order, extract_signature,
    line_span, node_text,
};
use crate::indexer::traversal::collect_targets;
use crate::languages::{LanguageDefinition, detect_language};

/// What to do when a file of a supported language fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AstFallback {
    #[default]
    LineBased,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOptions {
    /// Lines per window.
    pub chunk_size: usize,
    /// Lines shared by consecutive windows.
    pub chunk_overlap: usize,
    pub use_ast: bool,
    pub ast_fallback: AstFallback,
    /// Symbol chunks with less trimmed text are dropped.
    pub min_node_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 75,
            chunk_overlap: 10,
            use_ast: true,
            ast_fallback: AstFallback::LineBased,
            min_node_chars: 10,
        }
    }
}

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid chunk options: {0}")]
    InvalidOptions(String),
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidOptions("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::InvalidOptions(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits one file into chunks.
///
/// Supported languages go through the syntax tree; everything else, and
/// unparsable files when the fallback allows it, is cut into line windows.
pub fn chunk_file(path: &str, content: &str, options: &ChunkOptions) -> Result<Vec<Chunk>, ChunkError> {
    options.validate()?;
    let language = detect_language(Path::new(path));

    match language {
        Some(def) if options.use_ast => match chunk_by_ast(path, content, def, options) {
            Ok(chunks) => Ok(chunks),
            Err(err) => match options.ast_fallback {
                AstFallback::Error => Err(err),
                AstFallback::LineBased => {
                    warn!("AST chunking failed for {}, using line windows: {}", path, err);
                    Ok(chunk_by_lines(path, content, def.id, options))
                }
            },
        },
        Some(def) => Ok(chunk_by_lines(path, content, def.id, options)),
        None => Ok(chunk_by_lines(path, content, &fallback_language(path), options)),
    }
}

fn fallback_language(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "text".to_string())
}

/// File-level context shared by every chunk of one file.
struct FileContext {
    imports: Vec<String>,
    imported_symbols: BTreeMap<String, Vec<String>>,
    exports: Vec<String>,
}

impl FileContext {
    fn new(imports: Vec<ImportEntry>, exports: Vec<String>) -> Self {
        let mut imported_symbols = BTreeMap::new();
        for entry in &imports {
            if !entry.symbols.is_empty() {
                imported_symbols.insert(entry.import_path.clone(), entry.symbols.clone());
            }
        }
        Self {
            imports: dedupe_preserving_order(imports.into_iter().map(|e| e.import_path)),
            imported_symbols,
            exports,
        }
    }

    fn apply(&self, meta: &mut ChunkMetadata) {
        meta.imports = self.imports.clone();
        meta.imported_symbols = self.imported_symbols.clone();
        meta.exports = self.exports.clone();
    }
}

/// One chunk per symbol target plus `block` chunks for uncovered lines.
pub fn chunk_by_ast(
    path: &str,
    content: &str,
    language: &LanguageDefinition,
    options: &ChunkOptions,
) -> Result<Vec<Chunk>, ChunkError> {
    let tree = parse_file(Path::new(path), content, language)?;
    let root = tree.root_node();

    let context = FileContext::new(
        collect_imports(root, content, language.imports.as_ref()),
        language.exports.extract_exports(root, content),
    );

    let lines: Vec<&str> = content.lines().collect();
    let mut covered = vec![false; lines.len()];
    let mut chunks = Vec::new();

    for target in collect_targets(root, content, language.traverser.as_ref()) {
        let text = node_text(target.span, content);
        if text.trim().chars().count() < options.min_node_chars {
            continue;
        }
        let Some(symbol) = language.symbols.extract_symbol(
            target.node,
            content,
            target.parent_class.as_deref(),
        ) else {
            continue;
        };

        let (start_line, end_line) = line_span(target.span);
        let end_line = end_line.min(lines.len()).max(start_line);
        // Chunk identity is the line span, so AST chunks may not share lines.
        if covered
            .get(start_line - 1..end_line)
            .is_some_and(|span| span.iter().any(|&c| c))
        {
            warn!(
                "{}: {} at lines {}-{} overlaps an earlier symbol, skipped",
                path, symbol.name, start_line, end_line
            );
            continue;
        }

        let mut meta = ChunkMetadata::new(
            path,
            start_line,
            end_line,
            ChunkType::from(symbol.symbol_type),
            language.id,
        );
        meta.symbol_name = Some(target.bound_name.clone().unwrap_or(symbol.name));
        meta.symbol_type = Some(symbol.symbol_type);
        meta.parent_class = target.parent_class.clone();
        meta.signature = Some(if target.bound_name.is_some() {
            extract_signature(text, language.id)
        } else {
            symbol.signature
        });
        meta.parameters = symbol.parameters;
        meta.return_type = symbol.return_type;

        if symbol.symbol_type.is_callable() {
            let metrics = ComplexityMetrics::analyze(target.node, content, language.complexity);
            meta.complexity = Some(metrics.cyclomatic);
            meta.cognitive_complexity = Some(metrics.cognitive);
            meta.halstead = Some(HalsteadSummary::from(&metrics.halstead));
            meta.call_sites =
                collect_call_sites(target.node, content, language.symbols.as_ref());
        }
        context.apply(&mut meta);

        for flag in covered.iter_mut().take(end_line).skip(start_line - 1) {
            *flag = true;
        }
        chunks.push(Chunk {
            content: text.to_string(),
            metadata: meta,
        });
    }

    let blocks = uncovered_blocks(path, &lines, &covered, language.id, options);
    debug!(
        "{}: {} symbol chunks, {} block chunks",
        path,
        chunks.len(),
        blocks.len()
    );
    chunks.extend(blocks.into_iter().map(|mut block| {
        context.apply(&mut block.metadata);
        block
    }));
    chunks.sort_by_key(|c| (c.metadata.start_line, c.metadata.end_line));
    Ok(chunks)
}

/// Contiguous runs of lines no symbol chunk covers, windowed by `chunk_size`.
fn uncovered_blocks(
    path: &str,
    lines: &[&str],
    covered: &[bool],
    language: &str,
    options: &ChunkOptions,
) -> Vec<Chunk> {
    let mut blocks = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        if covered[index] || lines[index].trim().is_empty() {
            index += 1;
            continue;
        }
        let start = index;
        while index < lines.len() && !covered[index] {
            index += 1;
        }
        // Trailing blank lines do not belong to the block.
        let mut end = index;
        while end > start && lines[end - 1].trim().is_empty() {
            end -= 1;
        }

        let mut window_start = start;
        while window_start < end {
            let window_end = (window_start + options.chunk_size).min(end);
            let text = lines[window_start..window_end].join("\n");
            if text.trim().chars().count() >= options.min_node_chars {
                blocks.push(Chunk {
                    content: text,
                    metadata: ChunkMetadata::new(
                        path,
                        window_start + 1,
                        window_end,
                        ChunkType::Block,
                        language,
                    ),
                });
            }
            window_start = window_end;
        }
    }
    blocks
}

/// Fixed windows of `chunk_size` lines with `chunk_overlap` lines shared.
/// Blank windows are skipped.
pub fn chunk_by_lines(path: &str, content: &str, language: &str, options: &ChunkOptions) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let step = options.chunk_size.saturating_sub(options.chunk_overlap).max(1);
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < lines.len() {
        let end = (start + options.chunk_size).min(lines.len());
        let text = lines[start..end].join("\n");
        if !text.trim().is_empty() {
            let mut meta = ChunkMetadata::new(path, start + 1, end, ChunkType::Block, language);
            let symbols = extract_line_symbols(&text, language);
            if !symbols.is_empty() {
                meta.symbols = Some(symbols);
            }
            chunks.push(Chunk {
                content: text,
                metadata: meta,
            });
        }
        if end >= lines.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::symbols::SymbolType;

    const TS_SOURCE: &str = r#"import { Db } from "./db";

export interface UserRecord {
  id: string;
  name: string;
}

export class UserService {
  constructor(private db: Db) {}

  async findUser(id: string): Promise<UserRecord | null> {
    if (!id) {
      return null;
    }
    return this.db.get(id);
  }
}

export function formatUser(user: UserRecord): string {
  return `${user.name} (${user.id})`;
}

export const isAdmin = (user: UserRecord) => user.id === "admin";
"#;

    fn symbol<'a>(chunks: &'a [Chunk], name: &str) -> &'a Chunk {
        chunks
            .iter()
            .find(|c| c.metadata.symbol_name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no chunk for {name}"))
    }

    #[test]
    fn test_ast_chunks_for_typescript() {
        let chunks = chunk_file("src/user.ts", TS_SOURCE, &ChunkOptions::default()).unwrap();

        let interface = symbol(&chunks, "UserRecord");
        assert_eq!(interface.metadata.symbol_type, Some(SymbolType::Interface));
        assert_eq!(interface.metadata.chunk_type, ChunkType::Class);
        assert_eq!((interface.metadata.start_line, interface.metadata.end_line), (3, 6));

        let method = symbol(&chunks, "findUser");
        assert_eq!(method.metadata.symbol_type, Some(SymbolType::Method));
        assert_eq!(method.metadata.parent_class.as_deref(), Some("UserService"));
        assert_eq!(method.metadata.complexity, Some(2));
        assert_eq!(method.metadata.cognitive_complexity, Some(1));
        assert!(method.metadata.halstead.is_some());
        assert!(method.metadata.call_sites.iter().any(|c| c.key == "this.db.get"));

        let function = symbol(&chunks, "formatUser");
        assert_eq!(function.metadata.symbol_type, Some(SymbolType::Function));
        assert_eq!(function.metadata.parent_class, None);

        let arrow = symbol(&chunks, "isAdmin");
        assert_eq!(arrow.metadata.symbol_type, Some(SymbolType::Function));
        assert!(arrow.content.starts_with("const isAdmin"));

        // File context on every chunk.
        for chunk in &chunks {
            assert_eq!(chunk.metadata.imports, vec!["./db"]);
            assert!(chunk.metadata.exports.contains(&"UserService".to_string()));
        }

        // The import line is kept as a block chunk.
        let block = chunks
            .iter()
            .find(|c| c.metadata.chunk_type == ChunkType::Block)
            .unwrap();
        assert_eq!((block.metadata.start_line, block.metadata.end_line), (1, 1));
    }

    #[test]
    fn test_symbol_ranges_do_not_overlap() {
        let chunks = chunk_file("src/user.ts", TS_SOURCE, &ChunkOptions::default()).unwrap();
        let mut ranges: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.metadata.start_line, c.metadata.end_line))
            .collect();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "overlapping ranges {:?}", pair);
        }
        let total_lines = TS_SOURCE.lines().count();
        assert!(ranges.iter().all(|&(s, e)| s >= 1 && e <= total_lines));
    }

    #[test]
    fn test_symbols_sharing_a_line_keep_the_first() {
        let src = "function alpha() { return 1; } function beta() { return 2; }\n";
        let chunks = chunk_file("a.js", src, &ChunkOptions::default()).unwrap();
        let spans: Vec<(Option<&str>, usize, usize)> = chunks
            .iter()
            .map(|c| {
                (
                    c.metadata.symbol_name.as_deref(),
                    c.metadata.start_line,
                    c.metadata.end_line,
                )
            })
            .collect();
        assert_eq!(spans, vec![(Some("alpha"), 1, 1)]);
    }

    #[test]
    fn test_decorators_stay_with_their_function() {
        let src = "import functools\n\n\n@functools.lru_cache(maxsize=None)\ndef cached(value):\n    return value * 2\n\n\nclass Service:\n    @property\n    def name(self):\n        return \"svc\"\n";
        let chunks = chunk_file("svc.py", src, &ChunkOptions::default()).unwrap();

        let cached = symbol(&chunks, "cached");
        assert_eq!((cached.metadata.start_line, cached.metadata.end_line), (4, 6));
        assert!(cached.content.starts_with("@functools.lru_cache"));

        let name = symbol(&chunks, "name");
        assert_eq!((name.metadata.start_line, name.metadata.end_line), (10, 12));
        assert_eq!(name.metadata.parent_class.as_deref(), Some("Service"));
        assert!(name.content.starts_with("@property"));

        let blocks: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.metadata.chunk_type == ChunkType::Block)
            .collect();
        assert!(blocks.iter().all(|b| !b.content.contains('@')), "{blocks:?}");
    }

    #[test]
    fn test_tiny_symbols_are_dropped() {
        let options = ChunkOptions {
            min_node_chars: 40,
            ..ChunkOptions::default()
        };
        let src = "def a():\n    pass\n\ndef longer_function_name(value):\n    return value * 2\n";
        let chunks = chunk_file("m.py", src, &options).unwrap();
        let names: Vec<_> = chunks
            .iter()
            .filter_map(|c| c.metadata.symbol_name.clone())
            .collect();
        assert_eq!(names, vec!["longer_function_name"]);
    }

    #[test]
    fn test_parse_failure_falls_back_to_line_windows() {
        let mut src = String::from("function broken( {\n");
        for i in 0..24 {
            src.push_str(&format!("  const value{i} = {i};\n"));
        }
        let options = ChunkOptions {
            chunk_size: 10,
            chunk_overlap: 3,
            ..ChunkOptions::default()
        };

        let chunks = chunk_file("src/broken.ts", &src, &options).unwrap();
        let ranges: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.metadata.start_line, c.metadata.end_line))
            .collect();
        assert_eq!(ranges, vec![(1, 10), (8, 17), (15, 24), (22, 25)]);
        for chunk in &chunks {
            assert!(chunk.metadata.end_line - chunk.metadata.start_line < options.chunk_size);
            assert_eq!(chunk.metadata.chunk_type, ChunkType::Block);
            assert_eq!(chunk.metadata.complexity, None);
            assert_eq!(chunk.metadata.language, "typescript");
        }
        assert_eq!(
            chunks[0].metadata.symbols.as_ref().map(|s| s.functions.clone()),
            Some(vec!["broken".to_string()])
        );
    }

    #[test]
    fn test_parse_failure_propagates_with_error_fallback() {
        let options = ChunkOptions {
            ast_fallback: AstFallback::Error,
            ..ChunkOptions::default()
        };
        let err = chunk_file("src/broken.ts", "function broken( {\n", &options).unwrap_err();
        assert!(matches!(err, ChunkError::Parse(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_unknown_extension_uses_lines() {
        let src = "line one\n\n\nline four\n";
        let chunks = chunk_file("notes/readme.txt", src, &ChunkOptions::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.language, "txt");
        assert_eq!(chunks[0].metadata.end_line, 4);
    }

    #[test]
    fn test_blank_windows_are_skipped() {
        let src = "a\n\n\n\n\n\nb\n";
        let options = ChunkOptions {
            chunk_size: 2,
            chunk_overlap: 0,
            use_ast: false,
            ..ChunkOptions::default()
        };
        let chunks = chunk_file("x.py", src, &options).unwrap();
        let ranges: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.metadata.start_line, c.metadata.end_line))
            .collect();
        assert_eq!(ranges, vec![(1, 2), (7, 7)]);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ChunkOptions {
            chunk_size: 5,
            chunk_overlap: 5,
            ..ChunkOptions::default()
        };
        assert!(matches!(
            chunk_file("a.py", "x = 1\n", &options),
            Err(ChunkError::InvalidOptions(_))
        ));
    }
}
