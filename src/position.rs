//! Point and byte-offset primitives.
//!
//! Rows and columns are zero-based. Columns count bytes, matching
//! tree-sitter's own convention, so a [`Position`] can be handed to the
//! grammar backend without conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (row, column) location, ordered by row then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Position reached after writing `text` starting at `self`.
    pub fn advance(self, text: &str) -> Self {
        match text.rfind('\n') {
            None => Position::new(self.row, self.column + text.len()),
            Some(last_newline) => {
                let newlines = text.bytes().filter(|b| *b == b'\n').count();
                Position::new(self.row + newlines, text.len() - last_newline - 1)
            }
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

impl From<tree_sitter::Point> for Position {
    fn from(point: tree_sitter::Point) -> Self {
        Position::new(point.row, point.column)
    }
}

impl From<Position> for tree_sitter::Point {
    fn from(pos: Position) -> Self {
        tree_sitter::Point::new(pos.row, pos.column)
    }
}

/// Half-open byte span `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub const fn contains_byte(&self, byte: usize) -> bool {
        self.start <= byte && byte < self.end
    }

    pub const fn contains(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub const fn intersects(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl From<std::ops::Range<usize>> for ByteRange {
    fn from(range: std::ops::Range<usize>) -> Self {
        ByteRange::new(range.start, range.end)
    }
}

impl From<ByteRange> for std::ops::Range<usize> {
    fn from(range: ByteRange) -> Self {
        range.start..range.end
    }
}

/// A span described on both axes: points and bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start_point: Position,
    pub end_point: Position,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl TextRange {
    pub const fn new(
        start_point: Position,
        end_point: Position,
        start_byte: usize,
        end_byte: usize,
    ) -> Self {
        Self {
            start_point,
            end_point,
            start_byte,
            end_byte,
        }
    }

    /// Range covered by a tree-sitter node.
    pub fn of_node(node: tree_sitter::Node<'_>) -> Self {
        node.range().into()
    }

    /// Well-formed iff start does not exceed end on either axis.
    pub fn is_well_formed(&self) -> bool {
        self.start_point <= self.end_point && self.start_byte <= self.end_byte
    }

    pub const fn bytes(&self) -> ByteRange {
        ByteRange::new(self.start_byte, self.end_byte)
    }

    /// Inclusive on both ends: a point sitting exactly at `end_point` is inside.
    pub fn contains_point(&self, point: Position) -> bool {
        self.start_point <= point && point <= self.end_point
    }

    pub fn contains(&self, other: &TextRange) -> bool {
        self.start_byte <= other.start_byte
            && other.end_byte <= self.end_byte
            && self.start_point <= other.start_point
            && other.end_point <= self.end_point
    }

    pub fn intersects(&self, other: &TextRange) -> bool {
        self.bytes().intersects(&other.bytes())
    }
}

impl From<tree_sitter::Range> for TextRange {
    fn from(range: tree_sitter::Range) -> Self {
        TextRange::new(
            range.start_point.into(),
            range.end_point.into(),
            range.start_byte,
            range.end_byte,
        )
    }
}

impl From<TextRange> for tree_sitter::Range {
    fn from(range: TextRange) -> Self {
        tree_sitter::Range {
            start_byte: range.start_byte,
            end_byte: range.end_byte,
            start_point: range.start_point.into(),
            end_point: range.end_point.into(),
        }
    }
}

pub fn contains_point(range: &TextRange, point: Position) -> bool {
    range.contains_point(point)
}

pub fn contains_range(outer: &TextRange, inner: &TextRange) -> bool {
    outer.contains(inner)
}

pub fn intersects(a: &TextRange, b: &TextRange) -> bool {
    a.intersects(b)
}

/// Byte offset of `target`, scanning forward from a known `(anchor_byte, anchor)` pair.
///
/// The anchor must be a real location in `source` at or before `target`;
/// node starts are the usual anchors. Returns `None` when the row does not
/// exist, the column runs past the end of its line, or the offset would land
/// inside a multi-byte character.
pub fn offset_from_anchor(
    source: &[u8],
    anchor_byte: usize,
    anchor: Position,
    target: Position,
) -> Option<usize> {
    if target < anchor || anchor_byte > source.len() || anchor.column > anchor_byte {
        return None;
    }

    let mut line_start = anchor_byte - anchor.column;
    let mut row = anchor.row;
    while row < target.row {
        let newline = source[line_start..].iter().position(|b| *b == b'\n')?;
        line_start += newline + 1;
        row += 1;
    }

    let line_end = source[line_start..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(source.len(), |rel| line_start + rel);
    let offset = line_start + target.column;
    if offset > line_end || !is_char_boundary(source, offset) {
        return None;
    }
    Some(offset)
}

/// Byte offset of `target` scanning from the start of `source`.
pub fn byte_offset(source: &[u8], target: Position) -> Option<usize> {
    offset_from_anchor(source, 0, Position::default(), target)
}

/// Convert a point range into a byte range within `source`.
pub fn byte_range_for_points(source: &[u8], start: Position, end: Position) -> Option<ByteRange> {
    if end < start {
        return None;
    }
    let start_byte = byte_offset(source, start)?;
    let end_byte = offset_from_anchor(source, start_byte, start, end)?;
    Some(ByteRange::new(start_byte, end_byte))
}

/// Position of `offset`, counting newlines from the start of `source`.
pub fn position_for_offset(source: &[u8], offset: usize) -> Option<Position> {
    if offset > source.len() {
        return None;
    }
    let prefix = &source[..offset];
    let row = prefix.iter().filter(|b| **b == b'\n').count();
    let column = prefix
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(offset, |nl| offset - nl - 1);
    Some(Position::new(row, column))
}

fn is_char_boundary(source: &[u8], offset: usize) -> bool {
    match source.get(offset) {
        None => offset == source.len(),
        Some(byte) => (*byte & 0xC0) != 0x80,
    }
}
