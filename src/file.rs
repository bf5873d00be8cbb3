use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::edit::{Replacement, apply_replacements, validate_sorted};
use crate::error::{PatchError, Result};

/// Line break convention of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Detect the convention from the first line break (LF when there is none)
    pub fn detect(content: &str) -> Self {
        match content.find('\n') {
            Some(idx) if idx > 0 && content.as_bytes()[idx - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }

    /// Rewrite lone `\n` in `text` to this convention
    pub fn apply(self, text: &str) -> String {
        match self {
            LineEnding::Lf => text.to_string(),
            LineEnding::CrLf => {
                let mut out = String::with_capacity(text.len());
                let mut previous = None;
                for c in text.chars() {
                    if c == '\n' && previous != Some('\r') {
                        out.push('\r');
                    }
                    out.push(c);
                    previous = Some(c);
                }
                out
            }
        }
    }
}

/// BLAKE3 checksum of `content` (hex-encoded)
pub fn checksum(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Read a file from disk with UTF-8 validation
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        return Err(PatchError::NotFound(path_ref.to_path_buf()));
    }

    let bytes = fs::read(path_ref).map_err(|e| PatchError::io(path_ref, &e))?;

    String::from_utf8(bytes).map_err(|_| PatchError::InvalidUtf8(path_ref.to_path_buf()))
}

/// Per-file ledger of pending replacements
///
/// Holds the text captured when the file was first referenced and the
/// replacements collected since. Replacements are kept sorted by range and
/// never overlap.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    original: String,
    checksum: String,
    line_ending: LineEnding,
    replacements: Vec<Replacement>,
}

impl SourceFile {
    /// Capture the current content of `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = read_source(path_ref)?;
        debug!(path = %path_ref.display(), bytes = content.len(), "opened source file");
        Ok(Self::from_text(path_ref, content))
    }

    /// Build a ledger over text that is already in memory
    pub fn from_text(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let original = content.into();
        Self {
            path: path.into(),
            checksum: checksum(&original),
            line_ending: LineEnding::detect(&original),
            original,
            replacements: Vec::new(),
        }
    }

    /// A ledger over the same captured text, without replacements
    pub fn fork(&self) -> Self {
        Self {
            replacements: Vec::new(),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Replacements in ascending range order
    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn is_modified(&self) -> bool {
        !self.replacements.is_empty()
    }

    /// Append a replacement, rejecting it if it overlaps a recorded one
    ///
    /// The ledger stays untouched when an error is returned.
    pub fn add_replacement(&mut self, mut replacement: Replacement) -> Result<()> {
        replacement.text = self.line_ending.apply(&replacement.text);

        let idx = self
            .replacements
            .partition_point(|r| r.range <= replacement.range);

        if let Some(previous) = idx.checked_sub(1).map(|i| &self.replacements[i]) {
            if replacement.range.start().before(&previous.range.end()) {
                return Err(self.overlap(previous, &replacement));
            }
        }
        if let Some(next) = self.replacements.get(idx) {
            if next.range.start().before(&replacement.range.end()) {
                return Err(self.overlap(next, &replacement));
            }
        }

        debug!(
            path = %self.path.display(),
            range = %replacement.range,
            change = %replacement.change_id,
            "recorded replacement"
        );
        self.replacements.insert(idx, replacement);
        Ok(())
    }

    fn overlap(&self, existing: &Replacement, incoming: &Replacement) -> PatchError {
        PatchError::OverlappingEdit {
            path: self.path.clone(),
            existing: existing.range,
            incoming: incoming.range,
        }
    }

    /// The new full text with every replacement applied, without touching disk
    pub fn render(&self) -> Result<String> {
        validate_sorted(&self.path, &self.replacements)?;
        apply_replacements(&self.path, &self.original, &self.replacements)
    }

    /// Write the rendered text to disk
    ///
    /// Refuses to write if the file changed since it was captured. Files
    /// whose rendered text equals the original are left alone.
    ///
    /// # Returns
    /// * `Ok(true)` if the file was rewritten
    pub fn commit(&self) -> Result<bool> {
        let rendered = self.render()?;
        if rendered == self.original {
            return Ok(false);
        }

        let on_disk = read_source(&self.path)?;
        let actual = checksum(&on_disk);
        if actual != self.checksum {
            return Err(PatchError::ChecksumMismatch {
                path: self.path.clone(),
                expected: self.checksum.clone(),
                actual,
            });
        }

        fs::write(&self.path, rendered.as_bytes()).map_err(|e| PatchError::io(&self.path, &e))?;
        info!(
            path = %self.path.display(),
            replacements = self.replacements.len(),
            "rewrote source file"
        );
        Ok(true)
    }
}
