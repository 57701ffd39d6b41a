//! Change tracking.
//!
//! Converts an in-process entity mutation into a durable pending change
//! tagged with actor, version, and owning trip. One narrow method per entity
//! type keeps dispatch exhaustive at the call site.

use crate::db::{ChangeRepository, Database};
use crate::error::Result;
use crate::models::{
    Change, ChangePayload, DefaultItemRule, Item, Operation, Person, RuleOverride, RulePack, Trip,
    TripRule,
};

/// Actors whose ids carry this prefix are local-only; their mutations are
/// never shipped to the backend.
pub const LOCAL_ONLY_ACTOR_PREFIX: &str = "local-";

/// Stateless facade recording mutations into the pending-change queue
pub struct ChangeTracker<'a> {
    changes: ChangeRepository<'a>,
}

impl<'a> ChangeTracker<'a> {
    /// Create a tracker over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            changes: ChangeRepository::new(db),
        }
    }

    /// Record a trip mutation
    pub async fn track_trip_change(
        &self,
        operation: Operation,
        trip: &Trip,
        user_id: &str,
    ) -> Result<()> {
        let trip_id = Some(trip.id.clone());
        self.track(ChangePayload::Trip(trip.clone()), operation, user_id, trip_id)
            .await
    }

    /// Record a traveler mutation
    pub async fn track_person_change(
        &self,
        operation: Operation,
        person: &Person,
        user_id: &str,
    ) -> Result<()> {
        let trip_id = Some(person.trip_id.clone());
        self.track(
            ChangePayload::Person(person.clone()),
            operation,
            user_id,
            trip_id,
        )
        .await
    }

    /// Record an item mutation
    pub async fn track_item_change(
        &self,
        operation: Operation,
        item: &Item,
        user_id: &str,
    ) -> Result<()> {
        let trip_id = Some(item.trip_id.clone());
        self.track(ChangePayload::Item(item.clone()), operation, user_id, trip_id)
            .await
    }

    /// Record a packed/unpacked toggle on an item.
    ///
    /// `previous_status` distinguishes a real toggle from a bulk re-save of an
    /// unchanged item; unchanged status produces no change record.
    pub async fn track_packing_status_change(
        &self,
        item: &Item,
        user_id: &str,
        previous_status: bool,
    ) -> Result<()> {
        if item.packed == previous_status {
            tracing::debug!(item_id = %item.id, "packing status unchanged, not tracking");
            return Ok(());
        }
        self.track_item_change(Operation::Update, item, user_id).await
    }

    /// Record a default item rule mutation
    pub async fn track_rule_change(
        &self,
        operation: Operation,
        rule: &DefaultItemRule,
        user_id: &str,
    ) -> Result<()> {
        self.track(
            ChangePayload::DefaultItemRule(rule.clone()),
            operation,
            user_id,
            None,
        )
        .await
    }

    /// Record a rule pack mutation
    pub async fn track_rule_pack_change(
        &self,
        operation: Operation,
        pack: &RulePack,
        user_id: &str,
    ) -> Result<()> {
        self.track(
            ChangePayload::RulePack(pack.clone()),
            operation,
            user_id,
            None,
        )
        .await
    }

    /// Record a rule override mutation.
    ///
    /// The queued change is keyed by the override's composite id.
    pub async fn track_rule_override_change(
        &self,
        operation: Operation,
        rule_override: &RuleOverride,
        user_id: &str,
    ) -> Result<()> {
        let trip_id = Some(rule_override.trip_id.clone());
        self.track(
            ChangePayload::RuleOverride(rule_override.clone()),
            operation,
            user_id,
            trip_id,
        )
        .await
    }

    /// Record a trip rule activation mutation
    pub async fn track_trip_rule_change(
        &self,
        operation: Operation,
        trip_rule: &TripRule,
        user_id: &str,
    ) -> Result<()> {
        let trip_id = Some(trip_rule.trip_id.clone());
        self.track(
            ChangePayload::TripRule(trip_rule.clone()),
            operation,
            user_id,
            trip_id,
        )
        .await
    }

    async fn track(
        &self,
        payload: ChangePayload,
        operation: Operation,
        user_id: &str,
        trip_id: Option<String>,
    ) -> Result<()> {
        if user_id.starts_with(LOCAL_ONLY_ACTOR_PREFIX) {
            tracing::debug!(user_id, "local-only actor, not tracking");
            return Ok(());
        }

        let change = Change::new(payload, operation, user_id, trip_id);
        tracing::debug!(
            change_id = %change.id,
            entity_kind = %change.entity_kind(),
            operation = %change.operation,
            "queued pending change"
        );
        self.changes.append(&change).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample_trip() -> Trip {
        Trip::new(
            "Alps",
            "Chamonix",
            "2026-02-01".parse().unwrap(),
            "2026-02-07".parse().unwrap(),
            "u1",
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trip_create_queues_exactly_one_change() {
        let db = setup().await;
        let tracker = ChangeTracker::new(&db);

        let trip = sample_trip();
        tracker
            .track_trip_change(Operation::Create, &trip, "u1")
            .await
            .unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, Operation::Create);
        assert_eq!(pending[0].entity_id(), trip.id);
        assert_eq!(pending[0].trip_id.as_deref(), Some(trip.id.as_str()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_only_actor_changes_are_dropped() {
        let db = setup().await;
        let tracker = ChangeTracker::new(&db);

        let trip = sample_trip();
        tracker
            .track_trip_change(Operation::Create, &trip, "local-demo")
            .await
            .unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rule_override_change_uses_composite_id() {
        let db = setup().await;
        let tracker = ChangeTracker::new(&db);

        let rule_override = RuleOverride::new("t1", "r1", Some("p1".to_string()), None);
        tracker
            .track_rule_override_change(Operation::Create, &rule_override, "u1")
            .await
            .unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending[0].entity_id(), "t1::r1::p1::all");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packing_toggle_tracks_only_real_changes() {
        let db = setup().await;
        let tracker = ChangeTracker::new(&db);

        let mut item = Item::new("t1", "Socks", "clothing", 4);
        item.packed = true;
        item.touch();

        // Same status re-saved: not a mutation
        tracker
            .track_packing_status_change(&item, "u1", true)
            .await
            .unwrap();
        // Actual toggle
        tracker
            .track_packing_status_change(&item, "u1", false)
            .await
            .unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, Operation::Update);
    }
}
