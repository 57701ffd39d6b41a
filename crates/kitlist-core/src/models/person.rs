//! Traveler model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util;

/// A traveler attached to a trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Owning trip
    pub trip_id: String,
    /// Display name
    pub name: String,
    /// Age in years, when known (affects rule generation)
    pub age: Option<u32>,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Create a new traveler with a fresh id and version 1
    #[must_use]
    pub fn new(trip_id: impl Into<String>, name: impl Into<String>, age: Option<u32>) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            trip_id: trip_id.into(),
            name: name.into(),
            age,
            version: 1,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump version and refresh `updated_at` after a mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = util::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_person_belongs_to_trip() {
        let person = Person::new("trip-1", "Ada", Some(36));
        assert_eq!(person.trip_id, "trip-1");
        assert_eq!(person.version, 1);
        assert!(!person.is_deleted);
    }
}
