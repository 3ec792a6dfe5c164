//! Cursor-based navigation over parsed trees.
//!
//! Every walk here runs on a [`TreeCursor`] rather than recursion, so memory
//! is bounded by tree depth and adversarially deep inputs cannot exhaust the
//! call stack.

use crate::position::{Position, TextRange};
use crate::ts::tree::node_text;
use std::collections::HashSet;
use std::iter::FusedIterator;
use tree_sitter::{Language, Node, TreeCursor};

/// Lazy preorder walk over `node` and its descendants.
pub struct WalkTree<'tree> {
    start: Node<'tree>,
    cursor: TreeCursor<'tree>,
    done: bool,
    named_only: bool,
}

impl<'tree> WalkTree<'tree> {
    fn new(start: Node<'tree>, named_only: bool) -> Self {
        Self {
            start,
            cursor: start.walk(),
            done: false,
            named_only,
        }
    }

    /// Rewind to the starting node.
    pub fn restart(&mut self) {
        self.cursor.reset(self.start);
        self.done = false;
    }

    /// Depth of the node the cursor currently sits on, relative to the start.
    pub fn depth(&self) -> u32 {
        self.cursor.depth()
    }

    fn advance(&mut self) {
        if self.cursor.goto_first_child() || self.cursor.goto_next_sibling() {
            return;
        }
        loop {
            if !self.cursor.goto_parent() {
                self.done = true;
                return;
            }
            if self.cursor.goto_next_sibling() {
                return;
            }
        }
    }
}

impl<'tree> Iterator for WalkTree<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Node<'tree>> {
        while !self.done {
            let node = self.cursor.node();
            self.advance();
            if !self.named_only || node.is_named() {
                return Some(node);
            }
        }
        None
    }
}

impl FusedIterator for WalkTree<'_> {}

/// Preorder over `node` and every descendant.
pub fn walk_tree(node: Node<'_>) -> WalkTree<'_> {
    WalkTree::new(node, false)
}

/// Preorder over named nodes only.
pub fn walk_named(node: Node<'_>) -> WalkTree<'_> {
    WalkTree::new(node, true)
}

/// Smallest node whose range contains `point`.
pub fn find_node_at_point(root: Node<'_>, point: Position) -> Option<Node<'_>> {
    if !TextRange::of_node(root).contains_point(point) {
        return None;
    }
    root.descendant_for_point_range(point.into(), point.into())
}

/// Every node under the smallest node covering `range` that lies inside it.
pub fn find_nodes_in_range(root: Node<'_>, range: TextRange) -> Vec<Node<'_>> {
    if !range.is_well_formed() {
        return Vec::new();
    }
    let Some(cover) = root.descendant_for_byte_range(range.start_byte, range.end_byte) else {
        return Vec::new();
    };
    walk_tree(cover)
        .filter(|node| range.contains(&TextRange::of_node(*node)))
        .collect()
}

/// Smallest error-free node that fully contains `[start, end)`.
///
/// Starts from the smallest overlapping descendant and climbs while the
/// candidate does not contain the range, is missing, or has an error anywhere
/// in its subtree. `None` when no such ancestor exists, including when the
/// climb reaches an erroneous root.
pub fn get_node_at_byte_range(root: Node<'_>, start: usize, end: usize) -> Option<Node<'_>> {
    if end < start || end > root.end_byte() {
        return None;
    }
    let mut current = root.descendant_for_byte_range(start, end);
    while let Some(node) = current {
        let contains = node.start_byte() <= start && end <= node.end_byte();
        if contains && !node.has_error() && !node.is_missing() {
            return Some(node);
        }
        current = node.parent();
    }
    None
}

/// Lowest node that is an ancestor of (or equal to) both `a` and `b`.
pub fn find_common_ancestor<'tree>(a: Node<'tree>, b: Node<'tree>) -> Option<Node<'tree>> {
    let mut ancestors = HashSet::new();
    let mut current = Some(a);
    while let Some(node) = current {
        ancestors.insert(node.id());
        current = node.parent();
    }

    let mut current = Some(b);
    while let Some(node) = current {
        if ancestors.contains(&node.id()) {
            return Some(node);
        }
        current = node.parent();
    }
    None
}

pub fn find_error_nodes(root: Node<'_>) -> Vec<Node<'_>> {
    walk_tree(root).filter(|node| node.is_error()).collect()
}

pub fn find_missing_nodes(root: Node<'_>) -> Vec<Node<'_>> {
    walk_tree(root).filter(|node| node.is_missing()).collect()
}

pub fn find_nodes_by_type<'tree>(root: Node<'tree>, kind: &str) -> Vec<Node<'tree>> {
    walk_tree(root).filter(|node| node.kind() == kind).collect()
}

/// Nearest strict ancestor of the given type.
pub fn find_parent_of_type<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

pub fn find_child_by_field<'tree>(node: Node<'tree>, field: &str) -> Option<Node<'tree>> {
    node.child_by_field_name(field)
}

/// Nodes from the root down to `node`, inclusive.
pub fn node_path(node: Node<'_>) -> Vec<Node<'_>> {
    let mut path = vec![node];
    let mut current = node.parent();
    while let Some(parent) = current {
        path.push(parent);
        current = parent.parent();
    }
    path.reverse();
    path
}

/// Whether `source[start..end]` inside `node` reads exactly `expected`.
pub fn verify_byte_range(
    node: Node<'_>,
    source: &[u8],
    start: usize,
    end: usize,
    expected: &str,
) -> bool {
    if start > end || start < node.start_byte() || end > node.end_byte() || end > source.len() {
        return false;
    }
    &source[start..end] == expected.as_bytes()
}

/// Leaves (childless nodes) in document order.
pub fn leaves(root: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    walk_tree(root).filter(|node| node.child_count() == 0)
}

/// Symbols the grammar would accept where `error_node` sits.
///
/// Reads the parse state of the first leaf under the error and asks the
/// grammar's lookahead iterator which symbols may legally follow. Empty for
/// nodes without errors.
pub fn get_valid_symbols_at_error(error_node: Node<'_>, language: &Language) -> Vec<String> {
    if !error_node.has_error() {
        return Vec::new();
    }

    let mut cursor = error_node.walk();
    while cursor.goto_first_child() {}
    let state = cursor.node().parse_state();

    let Some(mut lookahead) = language.lookahead_iterator(state) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    lookahead
        .iter_names()
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Text of a node, lossily decoded. Convenience for callers holding raw nodes.
pub fn text_of<'s>(node: Node<'_>, source: &'s [u8]) -> std::borrow::Cow<'s, str> {
    node_text(source, node)
}
