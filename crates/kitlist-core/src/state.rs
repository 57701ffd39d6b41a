//! Composed sync state shown to subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Change, SyncConflict};

/// Snapshot of the device's sync situation.
///
/// Rebuilt on demand from the persistent store and the connectivity monitor;
/// never persisted wholesale (its parts are).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncState {
    /// When the last sync completed, if ever
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Changes awaiting remote acceptance, in creation order
    pub pending_changes: Vec<Change>,
    /// Raw platform network flag
    pub is_online: bool,
    /// Whether a sync pass is currently running
    pub is_syncing: bool,
    /// Unresolved conflicts
    pub conflicts: Vec<SyncConflict>,
}

impl SyncState {
    /// Number of changes awaiting remote acceptance
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_changes.len()
    }

    /// Number of unresolved conflicts
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}
