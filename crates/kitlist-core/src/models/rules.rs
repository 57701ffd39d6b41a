//! Generation rule models: default item rules, rule packs, per-trip
//! activations, and per-trip overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util;

/// Sentinel used in composite override ids for absent optional key parts
pub const OVERRIDE_KEY_ALL: &str = "all";

/// How a rule computes the quantity of items to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RuleCalculation {
    /// A fixed quantity regardless of trip shape
    Fixed { quantity: u32 },
    /// `quantity` per trip day
    PerDay { quantity: u32 },
    /// `quantity` per traveler
    PerPerson { quantity: u32 },
    /// `quantity` per traveler per trip day
    PerDayPerPerson { quantity: u32 },
}

/// Optional gating conditions for a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Only applies at or above this temperature (Celsius)
    pub min_temp_c: Option<i32>,
    /// Only applies at or below this temperature (Celsius)
    pub max_temp_c: Option<i32>,
    /// Free-form activity tags (beach, hiking, ...)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A reusable rule that generates packable items for a trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultItemRule {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Name of the generated item
    pub name: String,
    /// Category of the generated item
    pub category: String,
    /// Quantity calculation
    pub calculation: RuleCalculation,
    /// Gating conditions
    #[serde(default)]
    pub conditions: RuleConditions,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl DefaultItemRule {
    /// Create a new rule with a fresh id and version 1
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        calculation: RuleCalculation,
    ) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            name: name.into(),
            category: category.into(),
            calculation,
            conditions: RuleConditions::default(),
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

/// A named bundle of rules that can be applied to a trip together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePack {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Display name
    pub name: String,
    /// What the pack is for
    pub description: String,
    /// Rules the pack bundles
    pub rule_ids: Vec<String>,
    /// Who authored the pack
    pub author: String,
    /// Ships with the app (not user-created)
    pub built_in: bool,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl RulePack {
    /// Create a new user-authored pack with a fresh id and version 1
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        rule_ids: Vec<String>,
        author: impl Into<String>,
    ) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            name: name.into(),
            description: description.into(),
            rule_ids,
            author: author.into(),
            built_in: false,
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

/// Activation of a rule on a specific trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRule {
    /// Unique identifier (caller-generated)
    pub id: String,
    /// Trip the rule is active on
    pub trip_id: String,
    /// The activated rule
    pub rule_id: String,
    /// Whether generation currently uses this rule
    pub active: bool,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl TripRule {
    /// Activate a rule on a trip
    #[must_use]
    pub fn new(trip_id: impl Into<String>, rule_id: impl Into<String>) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            trip_id: trip_id.into(),
            rule_id: rule_id.into(),
            active: true,
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

/// Per-trip adjustment of a rule's output, optionally scoped to a traveler
/// and/or a day. Has no single natural id; sync uses the composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    /// Unique row identifier (caller-generated)
    pub id: String,
    /// Trip being adjusted
    pub trip_id: String,
    /// Rule being adjusted
    pub rule_id: String,
    /// Traveler scope; `None` applies to all travelers
    pub person_id: Option<String>,
    /// Day scope; `None` applies to all days
    pub day_index: Option<u32>,
    /// Replacement quantity; `None` keeps the calculated one
    pub override_count: Option<u32>,
    /// Suppress the rule's output entirely for this scope
    pub is_excluded: bool,
    /// Monotonic mutation counter, starts at 1
    pub version: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl RuleOverride {
    /// Create a new override with a fresh id and version 1
    #[must_use]
    pub fn new(
        trip_id: impl Into<String>,
        rule_id: impl Into<String>,
        person_id: Option<String>,
        day_index: Option<u32>,
    ) -> Self {
        let now = util::now();
        Self {
            id: util::new_entity_id(),
            trip_id: trip_id.into(),
            rule_id: rule_id.into(),
            person_id,
            day_index,
            override_count: None,
            is_excluded: false,
            version: 1,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Composite sync key: trip, rule, traveler and day joined with `::`,
    /// absent optional parts written as [`OVERRIDE_KEY_ALL`].
    #[must_use]
    pub fn composite_id(&self) -> String {
        let person = self
            .person_id
            .as_deref()
            .unwrap_or(OVERRIDE_KEY_ALL)
            .to_string();
        let day = self
            .day_index
            .map_or_else(|| OVERRIDE_KEY_ALL.to_string(), |day| day.to_string());
        format!("{}::{}::{}::{}", self.trip_id, self.rule_id, person, day)
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
    fn composite_id_joins_all_key_parts() {
        let mut overrides = RuleOverride::new("t1", "r1", Some("p1".to_string()), Some(3));
        assert_eq!(overrides.composite_id(), "t1::r1::p1::3");

        overrides.person_id = None;
        overrides.day_index = None;
        assert_eq!(overrides.composite_id(), "t1::r1::all::all");
    }

    #[test]
    fn rule_calculation_serializes_with_mode_tag() {
        let calc = RuleCalculation::PerDayPerPerson { quantity: 2 };
        let json = serde_json::to_value(calc).unwrap();
        assert_eq!(json["mode"], "per_day_per_person");
        assert_eq!(json["quantity"], 2);
    }

    #[test]
    fn rule_conditions_default_is_open() {
        let rule = DefaultItemRule::new(
            "Socks",
            "clothing",
            RuleCalculation::PerDay { quantity: 1 },
        );
        assert_eq!(rule.conditions, RuleConditions::default());
    }
}
