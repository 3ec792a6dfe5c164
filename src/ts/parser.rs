use crate::position::Position;
use crate::ts::errors::TreeSitterError;
use crate::ts::language::{grammar, language_name, SupportLang};
use crate::ts::tree::SyntaxTree;
use crate::traversal::walk_tree;
use tree_sitter::Parser;

/// Parser capability: turns source bytes into a [`SyntaxTree`].
///
/// `old_tree` is a reuse hint for incremental parsing; it must already have
/// had every edit applied via [`SyntaxTree::edit`].
pub trait ParserBackend {
    fn language(&self) -> SupportLang;

    fn parse(&mut self, source: &[u8], old_tree: Option<&SyntaxTree>) -> Option<SyntaxTree>;

    /// Drop any in-progress parse state so the next parse starts fresh.
    fn reset(&mut self);
}

/// Tree-sitter parser bound to a single grammar.
pub struct LanguageParser {
    parser: Parser,
    language: SupportLang,
}

impl LanguageParser {
    pub fn new(language: SupportLang) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        parser
            .set_language(&grammar(language))
            .map_err(|_| TreeSitterError::LanguageSet {
                language: language_name(language),
            })?;

        Ok(Self { parser, language })
    }

    /// Parse UTF-8 text without a reuse hint.
    pub fn parse_str(&mut self, source: &str) -> Result<SyntaxTree, TreeSitterError> {
        self.parse(source.as_bytes(), None)
            .ok_or(TreeSitterError::ParseFailed)
    }
}

impl ParserBackend for LanguageParser {
    fn language(&self) -> SupportLang {
        self.language
    }

    fn parse(&mut self, source: &[u8], old_tree: Option<&SyntaxTree>) -> Option<SyntaxTree> {
        let hint = old_tree
            .filter(|old| old.language() == self.language)
            .map(SyntaxTree::inner);
        let tree = self.parser.parse(source, hint)?;
        Some(SyntaxTree::new(tree, source.to_vec(), self.language))
    }

    fn reset(&mut self) {
        self.parser.reset();
    }
}

impl std::fmt::Debug for LanguageParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageParser")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

/// Information about an ERROR or MISSING node in a parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub start_point: Position,
    pub end_point: Position,
    pub kind: String,
    pub missing: bool,
}

impl ErrorNode {
    pub fn from_node(node: tree_sitter::Node<'_>) -> Self {
        Self {
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
            start_point: node.start_position().into(),
            end_point: node.end_position().into(),
            kind: node.kind().to_string(),
            missing: node.is_missing(),
        }
    }
}

/// Every error or missing marker in the tree, in document order.
pub fn error_nodes(tree: &SyntaxTree) -> Vec<ErrorNode> {
    if !tree.has_error() {
        return Vec::new();
    }
    walk_tree(tree.root())
        .filter(|node| node.is_error() || node.is_missing())
        .map(ErrorNode::from_node)
        .collect()
}
