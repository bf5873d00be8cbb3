use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consolidate::{ApplyReport, apply_all};
use crate::error::{PatchError, Result};
use crate::intent::{Intent, PositionResolver};
use crate::registry::{ChangeRegistry, FileReport};
use crate::repr::CodeContext;

/// Why an edit exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The old value was absent.
    Create,
    /// The old value differs from the new one.
    Fix,
    /// Equal values, different literal spelling.
    Update,
    /// The old value is present but not needed.
    Trim,
}

/// Order in which categories are previewed.
pub const APPLY_ORDER: [Category; 4] = [
    Category::Create,
    Category::Fix,
    Category::Trim,
    Category::Update,
];

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Create => "create",
            Category::Fix => "fix",
            Category::Update => "update",
            Category::Trim => "trim",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Category::Create),
            "fix" => Ok(Category::Fix),
            "update" => Ok(Category::Update),
            "trim" => Ok(Category::Trim),
            other => Err(PatchError::UnknownCategory(other.to_string())),
        }
    }
}

/// The set of categories a run materializes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy(BTreeSet<Category>);

impl Policy {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        Self(categories.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::new(APPLY_ORDER)
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Policy {
    type Err = PatchError;

    /// Parse a comma separated list such as `create,fix`. The empty string
    /// selects no category.
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Category::from_str)
            .collect::<Result<BTreeSet<_>>>()
            .map(Policy)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Category::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// What applying one category on its own would do.
#[derive(Debug, Clone)]
pub struct CategoryPreview {
    pub category: Category,
    /// Number of intents in the category.
    pub intents: usize,
    pub report: ApplyReport,
    pub files: Vec<FileReport>,
}

#[derive(Debug)]
pub struct PolicyOutcome {
    /// One preview per category that has intents, in [`APPLY_ORDER`].
    pub previews: Vec<CategoryPreview>,
    /// Registry holding the selected intents, ready to preview or commit.
    pub registry: ChangeRegistry,
    pub report: ApplyReport,
}

/// Apply the intents at `selected` to `registry`, reporting skipped intents
/// by their index in `intents`.
fn apply_selected(
    registry: &mut ChangeRegistry,
    intents: &[Intent],
    selected: &[usize],
    resolver: &dyn PositionResolver,
    context: &CodeContext<'_>,
) -> ApplyReport {
    let subset: Vec<Intent> = selected.iter().map(|&i| intents[i].clone()).collect();
    let mut report = apply_all(registry, &subset, resolver, context);
    for skipped in &mut report.skipped {
        skipped.index = selected[skipped.index];
    }
    report
}

/// Preview every category, then apply the ones `policy` selects.
///
/// All passes run on forks of `base`, so they see the same captured text and
/// never touch disk. Intents keep their submission order in the final pass
/// and are still grouped per parent across categories.
pub fn run_policy(
    base: &ChangeRegistry,
    intents: &[Intent],
    policy: &Policy,
    resolver: &dyn PositionResolver,
    context: &CodeContext<'_>,
) -> PolicyOutcome {
    let mut previews = Vec::new();
    for category in APPLY_ORDER {
        let selected: Vec<usize> = (0..intents.len())
            .filter(|&i| intents[i].category == category)
            .collect();
        if selected.is_empty() {
            continue;
        }
        let mut fork = base.fork();
        let report = apply_selected(&mut fork, intents, &selected, resolver, context);
        previews.push(CategoryPreview {
            category,
            intents: selected.len(),
            report,
            files: fork.preview(),
        });
    }

    let selected: Vec<usize> = (0..intents.len())
        .filter(|&i| policy.contains(intents[i].category))
        .collect();
    let mut registry = base.fork();
    let report = apply_selected(&mut registry, intents, &selected, resolver, context);

    info!(
        %policy,
        intents = intents.len(),
        selected = selected.len(),
        replacements = registry.num_replacements(),
        "policy applied"
    );

    PolicyOutcome {
        previews,
        registry,
        report,
    }
}
