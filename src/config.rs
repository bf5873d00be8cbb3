use std::path::PathBuf;

use crate::policy::{Category, Policy};

/// Settings of one run, assembled from the command line and the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    pub policy: Policy,
    /// Write files instead of only previewing them
    pub commit: bool,
    /// Root of the content-addressed store for external values
    pub store_root: Option<PathBuf>,
    /// Context lines in unified diffs
    pub diff_context: usize,
}

impl PatchConfig {
    /// Policy used when neither the command line nor the request picks one.
    pub fn default_policy() -> Policy {
        Policy::new([Category::Create, Category::Fix])
    }

    /// Command line settings win, then the request's, then the defaults.
    pub fn resolve_policy(cli: Option<Policy>, request: Option<Policy>) -> Policy {
        cli.or(request).unwrap_or_else(Self::default_policy)
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            policy: Self::default_policy(),
            commit: false,
            store_root: None,
            diff_context: 3,
        }
    }
}
