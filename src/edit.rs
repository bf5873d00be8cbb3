use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, Result};
use crate::position::{Position, Range};

/// Identifier shared by every replacement of one logical change
///
/// Only used for grouping and reporting, never for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeId(pub u64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change_{}", self.0)
    }
}

/// A pending text substitution in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    /// Span of the original text to replace
    pub range: Range,
    /// Replacement text
    pub text: String,
    /// Logical change this replacement belongs to
    pub change_id: ChangeId,
}

/// Sort replacements by range in ascending order
///
/// The sort is stable: insertions at the same point keep their submission
/// order.
pub fn sort_replacements(replacements: &mut [Replacement]) {
    replacements.sort_by(|a, b| a.range.cmp(&b.range));
}

/// Verify that sorted replacements satisfy `previous.end <= next.start`
///
/// # Returns
/// * `Err(PatchError::OverlappingEdit)` naming the first offending pair
pub fn validate_sorted(path: &Path, sorted: &[Replacement]) -> Result<()> {
    for pair in sorted.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if next.range.start().before(&previous.range.end()) {
            return Err(PatchError::OverlappingEdit {
                path: path.to_path_buf(),
                existing: previous.range,
                incoming: next.range,
            });
        }
    }
    Ok(())
}

/// Apply replacements to `content` in a single forward pass
///
/// The content is walked once, character by character, while tracking the
/// current position. When the position reaches the start of the next pending
/// replacement its text is emitted and the original characters are skipped
/// until the replacement's end.
///
/// # Arguments
/// * `path` - File the content belongs to (used for error reporting)
/// * `content` - Original text
/// * `replacements` - Replacements in any order; they are sorted and
///   re-validated before rendering
///
/// # Returns
/// * `Ok(String)` - New text
/// * `Err(PatchError::OverlappingEdit)` - Two replacements overlap
/// * `Err(PatchError::OutOfBounds)` - A replacement does not fit the content
pub fn apply_replacements(
    path: &Path,
    content: &str,
    replacements: &[Replacement],
) -> Result<String> {
    let mut sorted = replacements.to_vec();
    sort_replacements(&mut sorted);
    validate_sorted(path, &sorted)?;

    let mut output = String::with_capacity(content.len());
    let mut pending = sorted.iter().peekable();
    let mut skip_until: Option<Position> = None;
    let mut position = Position::START;
    let mut chars = content.chars().peekable();

    loop {
        if skip_until == Some(position) {
            skip_until = None;
        }
        while let Some(replacement) = pending.next_if(|r| r.range.start() == position) {
            output.push_str(&replacement.text);
            if !replacement.range.is_empty() {
                skip_until = Some(replacement.range.end());
            }
        }

        let Some(c) = chars.next() else { break };
        let crlf = c == '\r' && chars.peek() == Some(&'\n');
        if crlf {
            chars.next();
        }
        if skip_until.is_none() {
            output.push(c);
            if crlf {
                output.push('\n');
            }
        }

        if crlf || c == '\n' {
            position = Position::new(position.line + 1, 0);
        } else {
            position.column += 1;
        }
    }

    if let Some(replacement) = pending.next() {
        return Err(PatchError::OutOfBounds {
            path: path.to_path_buf(),
            range: replacement.range,
        });
    }
    if let Some(end) = skip_until {
        return Err(PatchError::OutOfBounds {
            path: path.to_path_buf(),
            range: Range::point(end),
        });
    }

    Ok(output)
}
