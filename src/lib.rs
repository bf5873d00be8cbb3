// Position and range model
pub mod position;

// Error type
pub mod error;

// Replacement ledger core
pub mod edit;

// Per-file ledgers
pub mod file;

// Sequence alignment
pub mod align;

// Change registry
pub mod registry;

// Structural edit intents and parent nodes
pub mod intent;

// Intent consolidation
pub mod consolidate;

// Category policy
pub mod policy;

// Value to code translation
pub mod repr;

// Language detection module
pub mod language;

// External value storage
pub mod storage;

// Old/new value comparison
pub mod compare;

// Unified diff rendering
pub mod diff;

// JSON request/response module
pub mod json;

// Run configuration
pub mod config;

// Re-exports
pub use align::{Alignment, Op, align};
pub use compare::{diff_mapping, diff_sequence};
pub use config::PatchConfig;
pub use consolidate::{ApplyReport, SkippedIntent, apply_all, sequence_update};
pub use diff::generate_unified_diff;
pub use edit::{ChangeId, Replacement, apply_replacements};
pub use error::{PatchError, Result};
pub use file::{LineEnding, SourceFile, checksum};
pub use intent::{
    Element, Intent, IntentKind, MappingEntry, NewCode, NodeId, NodeKind, ParentNode,
    PositionResolver, SyntaxMap,
};
pub use json::{PatchRequest, PatchResponse, generate_session_id};
pub use language::{Language, detect_language};
pub use policy::{APPLY_ORDER, Category, CategoryPreview, Policy, PolicyOutcome, run_policy};
pub use position::{Position, Range, Span, byte_to_position, span_to_range};
pub use registry::{ChangeRecord, ChangeRegistry, FileChange, FileReport};
pub use repr::{CodeContext, CodeTranslator};
pub use storage::{CallSiteStore, ExternalStore, HashStore};
