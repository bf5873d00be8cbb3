use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::diff::generate_unified_diff;
use crate::edit::{ChangeId, Replacement};
use crate::error::{PatchError, Result};
use crate::file::SourceFile;
use crate::json::generate_session_id;
use crate::policy::Category;
use crate::position::{Position, Range};

/// Bookkeeping for one issued change id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub id: ChangeId,
    /// Category shared by every intent behind the change, if they agree.
    pub category: Option<Category>,
    /// Files the change added replacements to.
    pub files: BTreeSet<PathBuf>,
}

/// Rendered (and possibly written) state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub new_text: String,
    /// Unified diff between the captured and the rendered text.
    pub diff: String,
    /// True once the new text has been written to disk.
    pub written: bool,
}

impl FileChange {
    pub fn is_unchanged(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Outcome for one file. Failures are per file: other files are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<FileChange>,
}

/// Owns the ledgers of one run or one preview.
///
/// Not meant for concurrent use. Callers that compare from several threads
/// serialize submissions behind a single lock.
#[derive(Debug)]
pub struct ChangeRegistry {
    session_id: String,
    sources: BTreeMap<PathBuf, SourceFile>,
    aborted: BTreeMap<PathBuf, PatchError>,
    changes: Vec<ChangeRecord>,
    next_id: u64,
    diff_context: usize,
}

impl Default for ChangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self {
            session_id: generate_session_id(),
            sources: BTreeMap::new(),
            aborted: BTreeMap::new(),
            changes: Vec::new(),
            next_id: 0,
            diff_context: 3,
        }
    }

    /// Set the number of context lines in rendered diffs.
    pub fn with_diff_context(mut self, lines: usize) -> Self {
        self.diff_context = lines;
        self
    }

    /// An empty registry over the same captured file contents.
    ///
    /// Used for what-if previews: the fork sees exactly the text this
    /// registry captured, even if the files changed on disk since.
    pub fn fork(&self) -> Self {
        Self {
            sources: self
                .sources
                .iter()
                .map(|(path, source)| (path.clone(), source.fork()))
                .collect(),
            diff_context: self.diff_context,
            ..Self::new()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Register in-memory text for `path` instead of reading it from disk.
    pub fn open_text(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        let source = SourceFile::from_text(path.clone(), content);
        self.sources.insert(path, source);
    }

    /// The ledger for `path`, opening the file on first use.
    pub fn source(&mut self, path: &Path) -> Result<&mut SourceFile> {
        if !self.sources.contains_key(path) {
            let source = SourceFile::open(path)?;
            self.sources.insert(path.to_path_buf(), source);
        }
        self.sources
            .get_mut(path)
            .ok_or_else(|| PatchError::NotFound(path.to_path_buf()))
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources.values()
    }

    /// Issue a new change id.
    pub fn new_change(&mut self, category: Option<Category>) -> ChangeId {
        let id = ChangeId(self.next_id);
        self.next_id += 1;
        self.changes.push(ChangeRecord {
            id,
            category,
            files: BTreeSet::new(),
        });
        id
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn changes_in(&self, category: Category) -> impl Iterator<Item = &ChangeRecord> {
        self.changes
            .iter()
            .filter(move |c| c.category == Some(category))
    }

    /// Record a replacement of `range` in `path` under `change`.
    ///
    /// Replacements for a file whose patch was aborted are dropped.
    pub fn replace(
        &mut self,
        change: ChangeId,
        path: &Path,
        range: Range,
        text: impl Into<String>,
    ) -> Result<()> {
        if self.aborted.contains_key(path) {
            debug!(path = %path.display(), %change, "dropping replacement for aborted file");
            return Ok(());
        }

        let replacement = Replacement {
            range,
            text: text.into(),
            change_id: change,
        };
        self.source(path)?.add_replacement(replacement)?;

        if let Some(record) = self.changes.iter_mut().rev().find(|c| c.id == change) {
            record.files.insert(path.to_path_buf());
        }
        Ok(())
    }

    pub fn insert(
        &mut self,
        change: ChangeId,
        path: &Path,
        at: Position,
        text: impl Into<String>,
    ) -> Result<()> {
        self.replace(change, path, Range::point(at), text)
    }

    pub fn delete(&mut self, change: ChangeId, path: &Path, range: Range) -> Result<()> {
        self.replace(change, path, range, "")
    }

    /// Abort the patch of one file. Its ledger is kept for reporting but it
    /// will neither be rendered nor committed.
    pub fn abort_file(&mut self, path: &Path, error: PatchError) {
        warn!(path = %path.display(), %error, "aborting patch for file");
        self.aborted.entry(path.to_path_buf()).or_insert(error);
    }

    pub fn is_aborted(&self, path: &Path) -> bool {
        self.aborted.contains_key(path)
    }

    /// Number of replacements across all live ledgers.
    pub fn num_replacements(&self) -> usize {
        self.sources
            .iter()
            .filter(|(path, _)| !self.aborted.contains_key(*path))
            .map(|(_, source)| source.replacements().len())
            .sum()
    }

    fn report(&self, path: &Path, source: &SourceFile) -> FileReport {
        let result = match self.aborted.get(path) {
            Some(error) => Err(error.clone()),
            None => source.render().map(|new_text| FileChange {
                diff: generate_unified_diff(source.original(), &new_text, self.diff_context),
                new_text,
                written: false,
            }),
        };
        FileReport {
            path: path.to_path_buf(),
            result,
        }
    }

    /// Render every file into memory without touching disk.
    pub fn preview(&self) -> Vec<FileReport> {
        let mut reports: Vec<FileReport> = self
            .sources
            .iter()
            .map(|(path, source)| self.report(path, source))
            .collect();
        reports.extend(
            self.aborted
                .iter()
                .filter(|(path, _)| !self.sources.contains_key(*path))
                .map(|(path, error)| FileReport {
                    path: path.clone(),
                    result: Err(error.clone()),
                }),
        );
        reports
    }

    /// Write every modified file.
    ///
    /// Not transactional across files: a failure on one file leaves files
    /// already written modified.
    pub fn commit(&self) -> Vec<FileReport> {
        let mut reports = self.preview();
        for report in &mut reports {
            let Ok(change) = &mut report.result else {
                continue;
            };
            if change.is_unchanged() {
                continue;
            }
            let Some(source) = self.sources.get(&report.path) else {
                continue;
            };
            match source.commit() {
                Ok(written) => change.written = written,
                Err(error) => {
                    warn!(path = %report.path.display(), %error, "commit failed");
                    report.result = Err(error);
                }
            }
        }
        info!(
            session = %self.session_id,
            files = reports.iter().filter(|r| matches!(&r.result, Ok(c) if c.written)).count(),
            "commit finished"
        );
        reports
    }
}
