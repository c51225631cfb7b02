use std::path::Path;

use thiserror::Error;
use tree_sitter::{Language, Parser, Tree};

use crate::indexer::traversal::for_each_node;
use crate::languages::LanguageDefinition;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to load {language} grammar: {source}")]
    Grammar {
        language: String,
        #[source]
        source: tree_sitter::LanguageError,
    },

    #[error("parser produced no tree for {0}")]
    NoTree(String),

    #[error("{language} source has syntax errors (first at line {line})")]
    Syntax { language: String, line: usize },
}

/// Parses `source` with the default grammar of `language`.
///
/// A tree containing error or missing nodes counts as a failed parse.
pub fn parse_source(source: &str, language: &LanguageDefinition) -> Result<Tree, ParseError> {
    parse_with(source, language, language.grammar())
}

/// Parses the contents of `path`, picking the grammar dialect by extension.
pub fn parse_file(
    path: &Path,
    source: &str,
    language: &LanguageDefinition,
) -> Result<Tree, ParseError> {
    parse_with(source, language, language.grammar_for(path))
}

fn parse_with(
    source: &str,
    language: &LanguageDefinition,
    grammar: Language,
) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|source| ParseError::Grammar {
            language: language.id.to_string(),
            source,
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::NoTree(language.id.to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ParseError::Syntax {
            language: language.id.to_string(),
            line: first_error_line(root),
        });
    }
    Ok(tree)
}

fn first_error_line(root: tree_sitter::Node<'_>) -> usize {
    let mut line = None;
    for_each_node(root, |node| {
        if line.is_none() && (node.is_error() || node.is_missing()) {
            line = Some(node.start_position().row + 1);
        }
    });
    line.unwrap_or(1)
}
