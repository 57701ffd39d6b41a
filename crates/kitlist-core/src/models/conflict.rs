//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::models::EntityKind;
use crate::util;

/// What kind of divergence was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides mutated the same live entity
    UpdateConflict,
    /// One side deleted while the other mutated
    DeleteConflict,
}

impl ConflictType {
    /// Stable string form used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateConflict => "update_conflict",
            Self::DeleteConflict => "delete_conflict",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_conflict" => Ok(Self::UpdateConflict),
            "delete_conflict" => Ok(Self::DeleteConflict),
            other => Err(Error::InvalidInput(format!(
                "unknown conflict type: {other}"
            ))),
        }
    }
}

/// A detected divergence between the local and remote snapshots of one
/// entity. At most one unresolved conflict exists per entity at a time;
/// resolving deletes the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Unique conflict identifier
    pub id: String,
    /// Entity type the snapshots belong to
    pub entity_kind: EntityKind,
    /// Sync identity of the diverged entity
    pub entity_id: String,
    /// Local snapshot at detection time
    pub local_snapshot: Value,
    /// Remote snapshot at detection time
    pub server_snapshot: Value,
    /// Divergence classification
    pub conflict_type: ConflictType,
    /// When the divergence was detected
    pub timestamp: DateTime<Utc>,
}

impl SyncConflict {
    /// Record a new conflict between two snapshots
    #[must_use]
    pub fn new(
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        local_snapshot: Value,
        server_snapshot: Value,
        conflict_type: ConflictType,
    ) -> Self {
        Self {
            id: util::new_entity_id(),
            entity_kind,
            entity_id: entity_id.into(),
            local_snapshot,
            server_snapshot,
            conflict_type,
            timestamp: util::now(),
        }
    }
}
