//! Thread-local tree-sitter parser pool for the supported language family
//! (JavaScript/TypeScript), mirroring the per-language thread-local pool
//! pattern used for multi-file AST parsing elsewhere in the corpus.

use std::cell::RefCell;
use std::path::Path;
use tree_sitter::{Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Tsx,
}

pub fn detect_language(path: &Path) -> Option<SourceLanguage> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Some(SourceLanguage::JavaScript),
        Some("ts") => Some(SourceLanguage::TypeScript),
        Some("tsx") => Some(SourceLanguage::Tsx),
        _ => None,
    }
}

thread_local! {
    static JS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_javascript::LANGUAGE.into());
        p
    });

    static TS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
        p
    });

    static TSX_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into());
        p
    });
}

pub fn parse(content: &str, language: SourceLanguage) -> Option<Tree> {
    match language {
        SourceLanguage::JavaScript => JS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        SourceLanguage::TypeScript => TS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        SourceLanguage::Tsx => TSX_PARSER.with(|p| p.borrow_mut().parse(content, None)),
    }
}

pub fn node_text<'a>(node: tree_sitter::Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub fn node_line(node: tree_sitter::Node) -> u32 {
    node.start_position().row as u32 + 1
}

pub fn node_line_end(node: tree_sitter::Node) -> u32 {
    node.end_position().row as u32 + 1
}
