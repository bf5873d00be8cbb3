use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, Result};

/// Position in a text file
///
/// Ordered by line, then column. `\r\n` counts as a single line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub column: usize,
}

impl Position {
    /// First position of any text.
    pub const START: Position = Position { line: 1, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// True if `self` comes strictly before `other`.
    pub fn before(&self, other: &Position) -> bool {
        self < other
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open span `[start, end)` between two positions.
///
/// The fields are private so that `start <= end` always holds. A range with
/// `start == end` is an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct Range {
    start: Position,
    end: Position,
}

#[derive(Deserialize)]
struct RawRange {
    start: Position,
    end: Position,
}

impl TryFrom<RawRange> for Range {
    type Error = PatchError;

    fn try_from(raw: RawRange) -> Result<Self> {
        Range::new(raw.start, raw.end)
    }
}

impl Range {
    /// Build a range, failing with `InvalidRange` if `start > end`.
    pub fn new(start: Position, end: Position) -> Result<Self> {
        if end.before(&start) {
            return Err(PatchError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Zero-width range at `at`.
    pub fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// The gap between the end of `left` and the start of `right`.
    pub fn between(left: &Range, right: &Range) -> Result<Self> {
        Range::new(left.end, right.start)
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `at` lies inside the half-open span.
    pub fn contains(&self, at: Position) -> bool {
        self.start <= at && at < self.end
    }

    pub fn contains_range(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if one range ends exactly where the other starts.
    pub fn touches(&self, other: &Range) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// True if the two ranges cannot both be rewritten in one linear pass.
    ///
    /// Touching ranges do not overlap. An insertion point strictly inside a
    /// non-empty range does.
    pub fn overlaps(&self, other: &Range) -> bool {
        let (first, second) = if self <= other { (self, other) } else { (other, self) };
        second.start.before(&first.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Byte span in a text file, as reported by byte-oriented parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Starting byte offset
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
}

/// Convert a byte offset to a line and column position
///
/// # Arguments
/// * `content` - The file content as a string
/// * `byte_offset` - The byte offset to convert
///
/// # Returns
/// * `Position` with a 1-indexed line and a 0-indexed character column
/// * The position just past the last character if the offset is past the end
pub fn byte_to_position(content: &str, byte_offset: usize) -> Position {
    let mut position = Position::START;
    let mut chars = content.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if offset >= byte_offset {
            break;
        }
        match c {
            '\r' if matches!(chars.peek(), Some((_, '\n'))) => {
                chars.next();
                position = Position::new(position.line + 1, 0);
            }
            '\n' => position = Position::new(position.line + 1, 0),
            _ => position.column += 1,
        }
    }

    position
}

/// Convert a byte span to a `Range`
///
/// # Returns
/// * `Err(PatchError::InvalidRange)` if the span ends before it starts
pub fn span_to_range(content: &str, span: Span) -> Result<Range> {
    let start = byte_to_position(content, span.byte_start);
    let end = byte_to_position(content, span.byte_end);
    Range::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> Position {
        Position::new(line, column)
    }

    #[test]
    fn test_position_order_is_line_then_column() {
        assert!(pos(1, 9).before(&pos(2, 0)));
        assert!(pos(2, 1).before(&pos(2, 3)));
        assert!(!pos(2, 3).before(&pos(2, 3)));
    }

    #[test]
    fn test_range_rejects_reversed_positions() {
        let result = Range::new(pos(2, 0), pos(1, 5));

        match result {
            Err(PatchError::InvalidRange { start, end }) => {
                assert_eq!(start, pos(2, 0));
                assert_eq!(end, pos(1, 5));
            }
            _ => panic!("Expected PatchError::InvalidRange"),
        }
    }

    #[test]
    fn test_range_deserialize_validates() {
        let ok: Range = serde_json::from_str(
            r#"{"start": {"line": 1, "column": 2}, "end": {"line": 1, "column": 4}}"#,
        )
        .unwrap();
        assert_eq!(ok.start(), pos(1, 2));

        let bad = serde_json::from_str::<Range>(
            r#"{"start": {"line": 3, "column": 0}, "end": {"line": 1, "column": 4}}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_overlap_and_touch() {
        let a = Range::new(pos(1, 0), pos(1, 4)).unwrap();
        let b = Range::new(pos(1, 4), pos(1, 8)).unwrap();
        let c = Range::new(pos(1, 3), pos(1, 6)).unwrap();

        assert!(a.touches(&b));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_insertion_point_overlap() {
        let span = Range::new(pos(1, 0), pos(1, 4)).unwrap();

        assert!(span.overlaps(&Range::point(pos(1, 2))));
        assert!(!span.overlaps(&Range::point(pos(1, 0))));
        assert!(!span.overlaps(&Range::point(pos(1, 4))));
        assert!(!Range::point(pos(1, 2)).overlaps(&Range::point(pos(1, 2))));
    }

    #[test]
    fn test_byte_to_position_after_newline() {
        let content = "Hello\nWorld";
        // Byte offset 6 is right after '\n'
        assert_eq!(byte_to_position(content, 6), pos(2, 0));
        assert_eq!(byte_to_position(content, 3), pos(1, 3));
    }

    #[test]
    fn test_byte_to_position_crlf_is_one_break() {
        let content = "ab\r\ncd";
        assert_eq!(byte_to_position(content, 2), pos(1, 2));
        assert_eq!(byte_to_position(content, 4), pos(2, 0));
        assert_eq!(byte_to_position(content, 5), pos(2, 1));
    }

    #[test]
    fn test_byte_to_position_counts_characters() {
        let content = "é = 1";
        // 'é' is two bytes but one column
        assert_eq!(byte_to_position(content, 2), pos(1, 1));
    }

    #[test]
    fn test_span_to_range() {
        let content = "Hello\nWorld";
        let span = Span {
            byte_start: 0,
            byte_end: 5,
        };

        let range = span_to_range(content, span).unwrap();

        assert_eq!(range.start(), pos(1, 0));
        assert_eq!(range.end(), pos(1, 5));
    }
}
