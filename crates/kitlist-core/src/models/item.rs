//! Packable item model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util;

/// A packable item on a trip's list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Owning trip
    pub trip_id: String,
    /// Display name
    pub name: String,
    /// Category label (clothing, toiletries, ...)
    pub category: String,
    /// How many to pack
    pub quantity: u32,
    /// Whether the item has been packed
    pub packed: bool,
    /// Traveler the item belongs to; `None` means shared
    pub person_id: Option<String>,
    /// Day the item is for; `None` means whole trip
    pub day_index: Option<u32>,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a new unpacked item with a fresh id and version 1
    #[must_use]
    pub fn new(
        trip_id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: u32,
    ) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            trip_id: trip_id.into(),
            name: name.into(),
            category: category.into(),
            quantity,
            packed: false,
            person_id: None,
            day_index: None,
            version: 1,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign the item to a traveler
    #[must_use]
    pub fn for_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    /// Pin the item to a specific trip day
    #[must_use]
    pub const fn for_day(mut self, day_index: u32) -> Self {
        self.day_index = Some(day_index);
        self
    }

    /// Bump version and refresh `updated_at` after a mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = util::now();
    }
}
