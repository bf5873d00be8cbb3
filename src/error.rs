use std::path::PathBuf;

use thiserror::Error;

use crate::intent::NodeId;
use crate::position::{Position, Range};

/// Errors raised while building, validating, rendering or committing edits.
///
/// Structural variants (`InvalidRange`, `OverlappingEdit`, `OutOfBounds`)
/// abort the patch of the file they occurred in. `StorageLookup` only drops
/// the intent that referenced the missing value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A range whose start lies after its end.
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: Position, end: Position },

    /// Two replacements in one ledger cover a common span.
    #[error("overlapping edits in {}: {existing} and {incoming}", path.display())]
    OverlappingEdit {
        path: PathBuf,
        existing: Range,
        incoming: Range,
    },

    /// A replacement points at text the file does not contain.
    #[error("range {range} lies outside of {}", path.display())]
    OutOfBounds { path: PathBuf, range: Range },

    /// The position resolver knows nothing about this node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node exists but has no element with this index.
    #[error("node {node} has no element {index}")]
    UnknownElement { node: NodeId, index: usize },

    /// An external value could not be resolved in its store.
    #[error("external value {location} could not be loaded: {reason}")]
    StorageLookup { location: String, reason: String },

    /// The file on disk no longer matches the text captured at open time.
    #[error("{} changed on disk (expected checksum {expected}, found {actual})", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid UTF-8 in file: {}", .0.display())]
    InvalidUtf8(PathBuf),

    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Malformed request handed to the engine.
    #[error("invalid request: {0}")]
    Request(String),
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
