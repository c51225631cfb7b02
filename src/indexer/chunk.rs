use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::complexity::HalsteadMetrics;
use crate::indexer::symbols::{CallSite, SymbolType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Block,
}

impl From<SymbolType> for ChunkType {
    fn from(symbol_type: SymbolType) -> Self {
        match symbol_type {
            SymbolType::Function | SymbolType::Method => ChunkType::Function,
            SymbolType::Class | SymbolType::Interface => ChunkType::Class,
        }
    }
}

/// Halstead figures kept on a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HalsteadSummary {
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    pub bugs: f64,
}

impl From<&HalsteadMetrics> for HalsteadSummary {
    fn from(m: &HalsteadMetrics) -> Self {
        Self {
            volume: m.volume,
            difficulty: m.difficulty,
            effort: m.effort,
            bugs: m.bugs,
        }
    }
}

/// Symbol names found by pattern matching in line-based chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSymbols {
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub interfaces: Vec<String>,
}

impl LineSymbols {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty() && self.interfaces.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Repository-relative, forward slashes.
    pub file: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_type: Option<SymbolType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    /// Cyclomatic complexity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_complexity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halstead: Option<HalsteadSummary>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imported_symbols: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_sites: Vec<CallSite>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<LineSymbols>,
}

impl ChunkMetadata {
    /// Bare metadata for a span of `file`; callers fill in the rest.
    pub fn new(
        file: impl Into<String>,
        start_line: usize,
        end_line: usize,
        chunk_type: ChunkType,
        language: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line,
            chunk_type,
            language: language.into(),
            symbol_name: None,
            symbol_type: None,
            parent_class: None,
            signature: None,
            parameters: Vec::new(),
            return_type: None,
            complexity: None,
            cognitive_complexity: None,
            halstead: None,
            imports: Vec::new(),
            imported_symbols: BTreeMap::new(),
            exports: Vec::new(),
            call_sites: Vec::new(),
            symbols: None,
        }
    }
}

/// A contiguous span of one source file plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Text handed to the embedder: a short header followed by the code.
    pub fn embedding_text(&self) -> String {
        let meta = &self.metadata;
        let mut header = format!("[{}] {}", meta.language, meta.file);
        if let Some(name) = &meta.symbol_name {
            match &meta.parent_class {
                Some(parent) => header.push_str(&format!(" > {parent}::{name}")),
                None => header.push_str(&format!(" > {name}")),
            }
        }
        if let Some(signature) = &meta.signature {
            header.push_str(&format!("\n{signature}"));
        }
        format!("{header}\n{}", self.content)
    }

    /// A chunk is unique per file and line span.
    pub fn identity(&self) -> (&str, usize, usize) {
        (
            self.metadata.file.as_str(),
            self.metadata.start_line,
            self.metadata.end_line,
        )
    }

    pub fn is_callable(&self) -> bool {
        self.metadata
            .symbol_type
            .is_some_and(|t| t.is_callable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serializes_camel_case() {
        let mut meta = ChunkMetadata::new("src/a.ts", 3, 9, ChunkType::Function, "typescript");
        meta.symbol_name = Some("load".into());
        meta.symbol_type = Some(SymbolType::Method);
        meta.cognitive_complexity = Some(2);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["startLine"], 3);
        assert_eq!(json["type"], "function");
        assert_eq!(json["symbolType"], "method");
        assert_eq!(json["cognitiveComplexity"], 2);
        assert!(json.get("parentClass").is_none());
        assert!(json.get("imports").is_none());

        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_embedding_text_has_header() {
        let mut meta = ChunkMetadata::new("src/repo.ts", 1, 3, ChunkType::Function, "typescript");
        meta.symbol_name = Some("find".into());
        meta.parent_class = Some("Repo".into());
        let chunk = Chunk {
            content: "find() {}".into(),
            metadata: meta,
        };
        assert_eq!(chunk.embedding_text(), "[typescript] src/repo.ts > Repo::find\nfind() {}");
    }
}
