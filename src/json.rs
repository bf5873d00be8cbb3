use serde::{Deserialize, Serialize};

use crate::consolidate::SkippedIntent;
use crate::intent::{Intent, ParentNode};
use crate::policy::{Category, Policy, PolicyOutcome};
use crate::registry::FileReport;

/// Input of one run: the parent nodes the intents refer to and the intents.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchRequest {
    /// Session identifier, or "auto" to generate one
    #[serde(default = "auto_session")]
    pub session_id: String,

    #[serde(default)]
    pub nodes: Vec<ParentNode>,

    pub intents: Vec<Intent>,

    /// Categories to apply when the command line does not say
    #[serde(default)]
    pub policy: Option<Policy>,
}

fn auto_session() -> String {
    "auto".to_string()
}

/// Per-category preview summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummaryJson {
    pub category: Category,
    pub intents: usize,
    /// Files whose text the category alone would change
    pub files_changed: usize,
    pub skipped: usize,
    /// Change ids the final pass issued for this category alone
    pub changes: usize,
}

/// Final state of one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatusJson {
    pub path: String,

    /// "written", "changed" (preview only), "unchanged" or "failed"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FileReport> for FileStatusJson {
    fn from(report: &FileReport) -> Self {
        let path = report.path.display().to_string();
        match &report.result {
            Ok(change) if change.is_unchanged() => FileStatusJson {
                path,
                status: "unchanged".to_string(),
                diff: None,
                error: None,
            },
            Ok(change) => FileStatusJson {
                path,
                status: if change.written { "written" } else { "changed" }.to_string(),
                diff: Some(change.diff.clone()),
                error: None,
            },
            Err(error) => FileStatusJson {
                path,
                status: "failed".to_string(),
                diff: None,
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedIntentJson {
    pub index: usize,
    pub reason: String,
}

impl From<&SkippedIntent> for SkippedIntentJson {
    fn from(skipped: &SkippedIntent) -> Self {
        Self {
            index: skipped.index,
            reason: skipped.error.to_string(),
        }
    }
}

/// Output of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchResponse {
    /// False if the request could not be processed or any file failed
    pub success: bool,

    pub session_id: String,

    pub policy: String,

    /// True when files were written, false for a preview
    pub committed: bool,

    pub categories: Vec<CategorySummaryJson>,

    pub files: Vec<FileStatusJson>,

    pub skipped: Vec<SkippedIntentJson>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PatchResponse {
    /// Build the response of a run that produced `files`
    pub fn success(
        session_id: String,
        policy: &Policy,
        outcome: &PolicyOutcome,
        files: &[FileReport],
        committed: bool,
    ) -> Self {
        let categories = outcome
            .previews
            .iter()
            .map(|preview| CategorySummaryJson {
                category: preview.category,
                intents: preview.intents,
                files_changed: preview
                    .files
                    .iter()
                    .filter(|f| matches!(&f.result, Ok(change) if !change.is_unchanged()))
                    .count(),
                skipped: preview.report.skipped.len(),
                changes: outcome.registry.changes_in(preview.category).count(),
            })
            .collect();

        Self {
            success: files.iter().all(|f| f.result.is_ok()),
            session_id,
            policy: policy.to_string(),
            committed,
            categories,
            files: files.iter().map(FileStatusJson::from).collect(),
            skipped: outcome.report.skipped.iter().map(SkippedIntentJson::from).collect(),
            error: None,
        }
    }

    /// Build a response for a run that failed before touching any file
    pub fn failure(session_id: String, error: String) -> Self {
        Self {
            success: false,
            session_id,
            policy: String::new(),
            committed: false,
            categories: Vec::new(),
            files: Vec::new(),
            skipped: Vec::new(),
            error: Some(error),
        }
    }

    /// Number of files written or changed
    pub fn changed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == "written" || f.status == "changed")
            .count()
    }
}

/// Generate a unique session identifier
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
