//! Conflict detection and resolution.
//!
//! Detection structurally compares the local and remote snapshots of one
//! entity; resolution removes the recorded conflict and offers advisory,
//! confidence-scored suggestions. Nothing here applies a resolution without
//! an explicit caller-issued resolve call.

mod detector;
mod resolver;

pub use detector::{deep_equal, detect_conflict, diff_snapshots, DiffKind, FieldDiff};
pub use resolver::{
    merged_snapshot, Confidence, ConflictResolver, ResolutionStrategy, ResolutionSuggestion,
};
