//! Localized text edits over parsed trees.
//!
//! An [`EditOperation`] is a self-describing, replayable record: it carries
//! byte offsets, points, and both the text it expects to replace and the
//! text it inserts. Every application re-verifies the expected text before
//! touching anything, so an edit computed against stale state fails with
//! [`EditError::Mismatch`] instead of corrupting the tree.

use crate::position::{offset_from_anchor, Position};
use crate::ts::errors::ReparseError;
use crate::ts::parser::ParserBackend;
use crate::ts::tree::SyntaxTree;
use crate::traversal::walk_tree;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tree_sitter::InputEdit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "EditOperation does nothing until applied"]
pub struct EditOperation {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_point: Position,
    pub old_end_point: Position,
    pub new_end_point: Position,
    pub old_text: String,
    pub new_text: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("expected {expected:?} at byte {start_byte}, found {found:?}")]
    Mismatch {
        start_byte: usize,
        expected: String,
        found: String,
    },

    #[error("position {position} is outside the tree")]
    OutOfBounds { position: Position },

    #[error("byte range [{byte_start}, {byte_end}) is outside a source of {source_len} bytes")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        source_len: usize,
    },

    #[error("edits overlap at bytes {first_start} and {second_start}")]
    Overlapping {
        first_start: usize,
        second_start: usize,
    },

    #[error("edit would create malformed UTF-8")]
    InvalidUtf8Edit,
}

impl EditOperation {
    /// Tree-sitter's view of this edit.
    pub fn input_edit(&self) -> InputEdit {
        InputEdit {
            start_byte: self.start_byte,
            old_end_byte: self.old_end_byte,
            new_end_byte: self.new_end_byte,
            start_position: self.start_point.into(),
            old_end_position: self.old_end_point.into(),
            new_end_position: self.new_end_point.into(),
        }
    }

    /// Check that `source` still holds `old_text` at `start_byte`.
    pub fn verify(&self, source: &[u8]) -> Result<(), EditError> {
        if self.start_byte > self.old_end_byte || self.old_end_byte > source.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.start_byte,
                byte_end: self.old_end_byte,
                source_len: source.len(),
            });
        }

        let current = &source[self.start_byte..self.old_end_byte];
        if current != self.old_text.as_bytes() {
            return Err(EditError::Mismatch {
                start_byte: self.start_byte,
                expected: self.old_text.clone(),
                found: String::from_utf8_lossy(current).into_owned(),
            });
        }
        Ok(())
    }

    /// Splice `new_text` into `source` after verifying `old_text`.
    pub fn replay(&self, source: &mut Vec<u8>) -> Result<(), EditError> {
        self.verify(source)?;
        source.splice(
            self.start_byte..self.old_end_byte,
            self.new_text.as_bytes().iter().copied(),
        );
        Ok(())
    }

    /// Byte delta this edit introduces.
    pub fn delta(&self) -> isize {
        self.new_text.len() as isize - self.old_text.len() as isize
    }
}

/// Build an edit replacing `old_text` at `start` with `new_text`.
///
/// The byte offset is found by scanning forward from the start of the
/// smallest node covering `start`, so only the lines between that node and
/// the target are visited. Pure: the tree is not touched.
pub fn create_edit(
    tree: &SyntaxTree,
    old_text: &str,
    new_text: &str,
    start: Position,
) -> Result<EditOperation, EditError> {
    let source = tree.source();
    let root = tree.root();

    let (anchor_byte, anchor_point) = root
        .descendant_for_point_range(start.into(), start.into())
        .map(|node| (node.start_byte(), Position::from(node.start_position())))
        .filter(|(_, point)| *point <= start)
        .unwrap_or((0, Position::default()));

    let start_byte = offset_from_anchor(source, anchor_byte, anchor_point, start)
        .or_else(|| offset_from_anchor(source, 0, Position::default(), start))
        .ok_or(EditError::OutOfBounds { position: start })?;

    let old_end_byte = start_byte + old_text.len();
    let edit = EditOperation {
        start_byte,
        old_end_byte,
        new_end_byte: start_byte + new_text.len(),
        start_point: start,
        old_end_point: start.advance(old_text),
        new_end_point: start.advance(new_text),
        old_text: old_text.to_string(),
        new_text: new_text.to_string(),
    };

    if old_end_byte > source.len() {
        return Err(EditError::OutOfBounds {
            position: edit.old_end_point,
        });
    }
    edit.verify(source)?;
    Ok(edit)
}

/// Apply `edit` to the tree's bookkeeping after re-verifying its text.
///
/// On any error the tree is left untouched. On success the tree is
/// untrusted until reparsed.
pub fn apply_edit(tree: &mut SyntaxTree, edit: &EditOperation) -> Result<(), EditError> {
    edit.verify(tree.source())?;
    tree.edit(&edit.input_edit());
    Ok(())
}

/// Sort edits by descending `start_byte` and reject overlapping spans.
///
/// Applying from the end of the buffer backwards keeps each edit's recorded
/// offsets valid while the ones after it are spliced in. Two edits starting
/// at the same byte have no defined order and are always rejected.
pub fn order_edits(edits: &[EditOperation]) -> Result<Vec<EditOperation>, EditError> {
    let mut ordered = edits.to_vec();
    ordered.sort_by(|a, b| {
        b.start_byte
            .cmp(&a.start_byte)
            .then(b.old_end_byte.cmp(&a.old_end_byte))
    });

    for window in ordered.windows(2) {
        let (later, earlier) = (&window[0], &window[1]);
        if earlier.old_end_byte > later.start_byte || earlier.start_byte == later.start_byte {
            return Err(EditError::Overlapping {
                first_start: earlier.start_byte,
                second_start: later.start_byte,
            });
        }
    }
    Ok(ordered)
}

/// Splice already-ordered edits into a copy of `source`.
pub fn replay_edits(source: &[u8], ordered: &[EditOperation]) -> Result<Vec<u8>, EditError> {
    let mut updated = source.to_vec();
    for edit in ordered {
        edit.replay(&mut updated)?;
    }
    std::str::from_utf8(&updated).map_err(|_| EditError::InvalidUtf8Edit)?;
    Ok(updated)
}

/// Reparse `new_source` using `tree` as the reuse hint.
///
/// Fails if the parser yields nothing or the result still contains an error
/// or missing node; the first such node is reported.
pub fn reparse(
    tree: &SyntaxTree,
    new_source: &[u8],
    parser: &mut dyn ParserBackend,
) -> Result<SyntaxTree, ReparseError> {
    let reparsed = parser
        .parse(new_source, Some(tree))
        .ok_or(ReparseError::ParseFailed)?;
    ensure_clean(&reparsed)?;
    Ok(reparsed)
}

/// Error unless the tree is free of error and missing nodes.
pub fn ensure_clean(tree: &SyntaxTree) -> Result<(), ReparseError> {
    if !tree.has_error() {
        return Ok(());
    }
    let offending = walk_tree(tree.root()).find(|node| node.is_error() || node.is_missing());
    Err(match offending {
        Some(node) => ReparseError::Invalid {
            kind: if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                node.kind().to_string()
            },
            position: node.start_position().into(),
            byte: node.start_byte(),
        },
        None => ReparseError::Invalid {
            kind: tree.root().kind().to_string(),
            position: tree.root().start_position().into(),
            byte: tree.root().start_byte(),
        },
    })
}
