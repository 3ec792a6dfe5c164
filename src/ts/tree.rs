//! Read-only view over a parsed tree and the source it was parsed from.

use crate::position::{Position, TextRange};
use crate::ts::language::SupportLang;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;
use tree_sitter::{InputEdit, Node, Tree, TreeCursor};

/// A parsed tree bound to its immutable source buffer.
///
/// The tree is *trusted* only straight out of a parse. [`SyntaxTree::edit`]
/// shifts byte/point bookkeeping without reparsing, after which node
/// positions no longer describe [`SyntaxTree::source`] and the tree stays
/// untrusted until it is used as the hint for a reparse.
#[derive(Clone)]
pub struct SyntaxTree {
    tree: Tree,
    source: Arc<[u8]>,
    language: SupportLang,
    trusted: bool,
}

impl SyntaxTree {
    pub fn new(tree: Tree, source: impl Into<Arc<[u8]>>, language: SupportLang) -> Self {
        Self {
            tree,
            source: source.into(),
            language,
            trusted: true,
        }
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Root node shifted by a byte and point offset, for trees parsed from a
    /// slice of a larger document.
    pub fn root_with_offset(&self, offset_bytes: usize, offset_extent: Position) -> Node<'_> {
        self.tree
            .root_node_with_offset(offset_bytes, offset_extent.into())
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.tree.walk()
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<[u8]> {
        Arc::clone(&self.source)
    }

    pub fn language(&self) -> SupportLang {
        self.language
    }

    pub fn inner(&self) -> &Tree {
        &self.tree
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Text covered by `node`; invalid UTF-8 becomes U+FFFD.
    pub fn text(&self, node: Node<'_>) -> Cow<'_, str> {
        node_text(&self.source, node)
    }

    /// True iff any node is an error or missing marker.
    pub fn has_error(&self) -> bool {
        self.root().has_error()
    }

    /// Shift node bookkeeping for an edit. Does not reparse.
    pub fn edit(&mut self, edit: &InputEdit) {
        self.tree.edit(edit);
        self.trusted = false;
    }

    /// Ranges whose syntactic structure differs between this tree and `other`.
    ///
    /// `self` should be the edited old tree and `other` the tree produced by
    /// reparsing with it as the hint.
    pub fn changed_ranges(&self, other: &SyntaxTree) -> Vec<TextRange> {
        self.tree
            .changed_ranges(&other.tree)
            .map(TextRange::from)
            .collect()
    }

    /// Same source bytes and same node structure.
    pub fn structurally_eq(&self, other: &SyntaxTree) -> bool {
        self.language == other.language
            && self.source == other.source
            && self.root().to_sexp() == other.root().to_sexp()
    }

    /// Indented s-expression rendering with leaf text inline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut cursor = self.walk();
        let mut depth = 0usize;
        loop {
            let node = cursor.node();
            let indent = "  ".repeat(depth);
            let field = cursor
                .field_name()
                .map(|name| format!("{name}: "))
                .unwrap_or_default();
            let kind = if node.is_missing() {
                format!("MISSING {}", node.kind())
            } else {
                node.kind().to_string()
            };
            let _ = write!(
                out,
                "{indent}{field}({kind} [{}] - [{}]",
                Position::from(node.start_position()),
                Position::from(node.end_position())
            );
            if node.child_count() == 0 {
                let text = self.text(node);
                let text = text.trim();
                if !text.is_empty() && text != node.kind() {
                    let _ = write!(out, " {text:?}");
                }
            }
            out.push_str(")\n");

            if cursor.goto_first_child() {
                depth += 1;
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return out;
                }
                depth -= 1;
            }
        }
    }
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.language)
            .field("source_len", &self.source.len())
            .field("root", &self.root().kind())
            .field("trusted", &self.trusted)
            .finish()
    }
}

/// Lossy UTF-8 decode of a node's byte span in `source`.
pub fn node_text<'s>(source: &'s [u8], node: Node<'_>) -> Cow<'s, str> {
    let end = node.end_byte().min(source.len());
    let start = node.start_byte().min(end);
    String::from_utf8_lossy(&source[start..end])
}
