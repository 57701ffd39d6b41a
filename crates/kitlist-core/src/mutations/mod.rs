//! Mutation handlers encoding the triple-write discipline.
//!
//! Every local mutation must, as one logical unit: (a) update the caller's
//! in-memory state, (b) persist the entity, (c) track the change for sync.
//! This facade performs (b) and (c) together and hands the written entity
//! back for (a), so callers cannot forget half of the contract.

use crate::db::{Database, EntityStore};
use crate::error::Result;
use crate::models::{
    DefaultItemRule, Item, Operation, Person, RuleOverride, RulePack, Trip, TripRule,
};
use crate::tracker::ChangeTracker;

/// Facade binding the persistent store and the change tracker to one actor
pub struct MutationContext<'a> {
    store: EntityStore<'a>,
    tracker: ChangeTracker<'a>,
    user_id: String,
}

macro_rules! entity_mutations {
    ($create:ident, $update:ident, $delete:ident, $type:ty, $track:ident) => {
        /// Persist and track a newly created entity
        pub async fn $create(&self, entity: $type) -> Result<$type> {
            self.store.save(&entity).await?;
            self.tracker
                .$track(Operation::Create, &entity, &self.user_id)
                .await?;
            Ok(entity)
        }

        /// Persist and track an update; bumps version and `updated_at`
        pub async fn $update(&self, mut entity: $type) -> Result<$type> {
            entity.touch();
            self.store.save(&entity).await?;
            self.tracker
                .$track(Operation::Update, &entity, &self.user_id)
                .await?;
            Ok(entity)
        }

        /// Tombstone and track a delete.
        ///
        /// Deleting a missing or already-deleted entity is a no-op.
        pub async fn $delete(&self, id: &str) -> Result<()> {
            let Some(existing) = self.store.get::<$type>(id).await? else {
                tracing::debug!(id, "delete of missing entity, no-op");
                return Ok(());
            };
            if existing.is_deleted {
                return Ok(());
            }

            self.store.delete::<$type>(id).await?;
            if let Some(tombstone) = self.store.get::<$type>(id).await? {
                self.tracker
                    .$track(Operation::Delete, &tombstone, &self.user_id)
                    .await?;
            }
            Ok(())
        }
    };
}

impl<'a> MutationContext<'a> {
    /// Create a context over the given database for one actor
    #[must_use]
    pub fn new(db: &'a Database, user_id: impl Into<String>) -> Self {
        Self {
            store: EntityStore::new(db),
            tracker: ChangeTracker::new(db),
            user_id: user_id.into(),
        }
    }

    entity_mutations!(create_trip, update_trip, delete_trip, Trip, track_trip_change);
    entity_mutations!(
        create_person,
        update_person,
        delete_person,
        Person,
        track_person_change
    );
    entity_mutations!(create_item, update_item, delete_item, Item, track_item_change);
    entity_mutations!(
        create_rule,
        update_rule,
        delete_rule,
        DefaultItemRule,
        track_rule_change
    );
    entity_mutations!(
        create_rule_pack,
        update_rule_pack,
        delete_rule_pack,
        RulePack,
        track_rule_pack_change
    );
    entity_mutations!(
        create_rule_override,
        update_rule_override,
        delete_rule_override,
        RuleOverride,
        track_rule_override_change
    );
    entity_mutations!(
        create_trip_rule,
        update_trip_rule,
        delete_trip_rule,
        TripRule,
        track_trip_rule_change
    );

    /// Toggle an item's packed status.
    ///
    /// Returns the updated item, or `None` when the id is unknown (a no-op,
    /// not an error). An unchanged status still persists but queues nothing.
    pub async fn set_item_packed(&self, item_id: &str, packed: bool) -> Result<Option<Item>> {
        let Some(mut item) = self.store.get::<Item>(item_id).await? else {
            tracing::debug!(item_id, "packing toggle on missing item, no-op");
            return Ok(None);
        };

        let previous_status = item.packed;
        if previous_status != packed {
            item.packed = packed;
            item.touch();
            self.store.save(&item).await?;
        }
        self.tracker
            .track_packing_status_change(&item, &self.user_id, previous_status)
            .await?;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChangeRepository;
    use crate::models::ChangePayload;

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
    async fn test_create_persists_and_tracks() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        let trip = ctx.create_trip(sample_trip()).await.unwrap();

        let stored: Trip = EntityStore::new(&db).get(&trip.id).await.unwrap().unwrap();
        assert_eq!(stored.id, trip.id);

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, Operation::Create);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_bumps_version_and_tracks() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        let trip = ctx.create_trip(sample_trip()).await.unwrap();
        let mut renamed = trip.clone();
        renamed.name = "Dolomites".to_string();
        let updated = ctx.update_trip(renamed).await.unwrap();

        assert_eq!(updated.version, 2);

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].operation, Operation::Update);
        assert_eq!(pending[1].version, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_tracks_the_tombstone() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        let item = ctx
            .create_item(Item::new("t1", "Socks", "clothing", 4))
            .await
            .unwrap();
        ctx.delete_item(&item.id).await.unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].operation, Operation::Delete);
        assert_eq!(pending[1].version, 2);

        // The delete change carries the tombstoned snapshot
        match &pending[1].payload {
            ChangePayload::Item(snapshot) => assert!(snapshot.is_deleted),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_of_missing_entity_tracks_nothing() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        ctx.delete_item("nope").await.unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packed_toggle_round_trip() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        let item = ctx
            .create_item(Item::new("t1", "Socks", "clothing", 4))
            .await
            .unwrap();

        let packed = ctx.set_item_packed(&item.id, true).await.unwrap().unwrap();
        assert!(packed.packed);
        assert_eq!(packed.version, 2);

        // Toggling to the same status queues nothing new
        ctx.set_item_packed(&item.id, true).await.unwrap();

        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 2); // create + one real toggle
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packed_toggle_on_missing_item_is_a_no_op() {
        let db = setup().await;
        let ctx = MutationContext::new(&db, "u1");

        assert!(ctx.set_item_packed("nope", true).await.unwrap().is_none());
    }
}
