//! Pending change model: a recorded local mutation not yet accepted by the
//! remote backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{DefaultItemRule, Item, Person, RuleOverride, RulePack, Trip, TripRule};
use crate::util;

/// Mutation kind carried by a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

/// Discriminant for the supported entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Trip,
    Person,
    Item,
    DefaultItemRule,
    RulePack,
    RuleOverride,
    TripRule,
}

impl EntityKind {
    /// Stable string form used in storage and on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Person => "person",
            Self::Item => "item",
            Self::DefaultItemRule => "default_item_rule",
            Self::RulePack => "rule_pack",
            Self::RuleOverride => "rule_override",
            Self::TripRule => "trip_rule",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trip" => Ok(Self::Trip),
            "person" => Ok(Self::Person),
            "item" => Ok(Self::Item),
            "default_item_rule" => Ok(Self::DefaultItemRule),
            "rule_pack" => Ok(Self::RulePack),
            "rule_override" => Ok(Self::RuleOverride),
            "trip_rule" => Ok(Self::TripRule),
            other => Err(Error::InvalidInput(format!("unknown entity kind: {other}"))),
        }
    }
}

/// Typed snapshot carried by a change, one variant per entity type.
///
/// Exhaustive matching on this enum replaces string-keyed dispatch at the
/// tracker and resolver boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "data", rename_all = "snake_case")]
pub enum ChangePayload {
    Trip(Trip),
    Person(Person),
    Item(Item),
    DefaultItemRule(DefaultItemRule),
    RulePack(RulePack),
    RuleOverride(RuleOverride),
    TripRule(TripRule),
}

impl ChangePayload {
    /// Entity type discriminant
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Trip(_) => EntityKind::Trip,
            Self::Person(_) => EntityKind::Person,
            Self::Item(_) => EntityKind::Item,
            Self::DefaultItemRule(_) => EntityKind::DefaultItemRule,
            Self::RulePack(_) => EntityKind::RulePack,
            Self::RuleOverride(_) => EntityKind::RuleOverride,
            Self::TripRule(_) => EntityKind::TripRule,
        }
    }

    /// Sync identity of the carried entity.
    ///
    /// Rule overrides have no single natural id and use their composite key.
    #[must_use]
    pub fn entity_id(&self) -> String {
        match self {
            Self::Trip(trip) => trip.id.clone(),
            Self::Person(person) => person.id.clone(),
            Self::Item(item) => item.id.clone(),
            Self::DefaultItemRule(rule) => rule.id.clone(),
            Self::RulePack(pack) => pack.id.clone(),
            Self::RuleOverride(rule_override) => rule_override.composite_id(),
            Self::TripRule(trip_rule) => trip_rule.id.clone(),
        }
    }

    /// Entity version at the time the change was recorded
    #[must_use]
    pub const fn version(&self) -> i64 {
        match self {
            Self::Trip(trip) => trip.version,
            Self::Person(person) => person.version,
            Self::Item(item) => item.version,
            Self::DefaultItemRule(rule) => rule.version,
            Self::RulePack(pack) => pack.version,
            Self::RuleOverride(rule_override) => rule_override.version,
            Self::TripRule(trip_rule) => trip_rule.version,
        }
    }
}

/// A recorded local mutation queued for the remote backend.
///
/// Removed from the pending queue only after the remote accepts it; un-synced
/// changes persist across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Unique change identifier
    pub id: String,
    /// Typed entity snapshot
    pub payload: ChangePayload,
    /// Mutation kind
    pub operation: Operation,
    /// When the mutation happened locally
    pub timestamp: DateTime<Utc>,
    /// Actor that performed the mutation
    pub user_id: String,
    /// Owning trip, when the entity is trip-scoped
    pub trip_id: Option<String>,
    /// Entity version at recording time
    pub version: i64,
    /// Whether the remote has accepted this change
    pub synced: bool,
}

impl Change {
    /// Record a new un-synced change for the given mutation
    #[must_use]
    pub fn new(
        payload: ChangePayload,
        operation: Operation,
        user_id: impl Into<String>,
        trip_id: Option<String>,
    ) -> Self {
        let version = payload.version();
        Self {
            id: util::new_entity_id(),
            payload,
            operation,
            timestamp: util::now(),
            user_id: user_id.into(),
            trip_id,
            version,
            synced: false,
        }
    }

    /// Entity type discriminant of the carried snapshot
    #[must_use]
    pub const fn entity_kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Sync identity of the carried entity
    #[must_use]
    pub fn entity_id(&self) -> String {
        self.payload.entity_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleOverride;

    #[test]
    fn entity_kind_round_trips_through_strings() {
        for kind in [
            EntityKind::Trip,
            EntityKind::Person,
            EntityKind::Item,
            EntityKind::DefaultItemRule,
            EntityKind::RulePack,
            EntityKind::RuleOverride,
            EntityKind::TripRule,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn change_records_payload_version() {
        let mut item = Item::new("t1", "Socks", "clothing", 4);
        item.touch();
        let change = Change::new(
            ChangePayload::Item(item),
            Operation::Update,
            "u1",
            Some("t1".to_string()),
        );
        assert_eq!(change.version, 2);
        assert!(!change.synced);
        assert_eq!(change.entity_kind(), EntityKind::Item);
    }

    #[test]
    fn rule_override_changes_use_composite_id() {
        let rule_override = RuleOverride::new("t1", "r1", None, Some(2));
        let change = Change::new(
            ChangePayload::RuleOverride(rule_override),
            Operation::Create,
            "u1",
            Some("t1".to_string()),
        );
        assert_eq!(change.entity_id(), "t1::r1::all::2");
    }

    #[test]
    fn payload_serializes_with_entity_type_tag() {
        let item = Item::new("t1", "Socks", "clothing", 4);
        let json = serde_json::to_value(ChangePayload::Item(item)).unwrap();
        assert_eq!(json["entity_type"], "item");
        assert_eq!(json["data"]["name"], "Socks");
    }
}
