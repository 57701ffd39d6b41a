//! Trip model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::util;

/// A trip being packed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Display name
    pub name: String,
    /// Destination label
    pub destination: String,
    /// First day of the trip
    pub start_date: NaiveDate,
    /// Last day of the trip
    pub end_date: NaiveDate,
    /// Actor that owns this trip
    pub owner_id: String,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Create a new trip with a fresh id and version 1
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        owner_id: impl Into<String>,
    ) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            name: name.into(),
            destination: destination.into(),
            start_date,
            end_date,
            owner_id: owner_id.into(),
            version: 1,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of days the trip spans (inclusive), at least 1
    #[must_use]
    pub fn day_count(&self) -> u32 {
        let days = (self.end_date - self.start_date).num_days() + 1;
        u32::try_from(days.max(1)).unwrap_or(1)
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

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn new_trip_starts_at_version_one() {
        let trip = Trip::new("Alps", "Chamonix", date("2026-02-01"), date("2026-02-07"), "u1");
        assert_eq!(trip.version, 1);
        assert!(!trip.is_deleted);
        assert_eq!(trip.created_at, trip.updated_at);
    }

    #[test]
    fn touch_bumps_version() {
        let mut trip = Trip::new("Alps", "Chamonix", date("2026-02-01"), date("2026-02-07"), "u1");
        trip.touch();
        assert_eq!(trip.version, 2);
        assert!(trip.updated_at >= trip.created_at);
    }

    #[test]
    fn day_count_is_inclusive() {
        let trip = Trip::new("Alps", "Chamonix", date("2026-02-01"), date("2026-02-07"), "u1");
        assert_eq!(trip.day_count(), 7);

        let single = Trip::new("Day", "Home", date("2026-02-01"), date("2026-02-01"), "u1");
        assert_eq!(single.day_count(), 1);
    }
}
