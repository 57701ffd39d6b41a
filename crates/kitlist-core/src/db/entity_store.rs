//! Generic persistent store over the per-entity-type collections.
//!
//! Every collection shares one row shape (indexed sync columns plus the full
//! entity JSON), so a single store implementation serves all entity types
//! through the [`StoredEntity`] trait.

use chrono::{DateTime, Utc};
use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{Database, PersistenceMode};
use crate::error::Result;
use crate::models::{
    DefaultItemRule, EntityKind, Item, Person, RuleOverride, RulePack, Trip, TripRule,
};

/// Storage contract an entity type implements to live in the store
pub trait StoredEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Collection (table) the type is stored in
    const TABLE: &'static str;
    /// Entity type discriminant
    const KIND: EntityKind;

    /// Primary id
    fn id(&self) -> &str;
    /// Owning trip for trip-scoped types
    fn owning_trip(&self) -> Option<&str>;
    /// Current mutation counter
    fn version(&self) -> i64;
    /// Tombstone flag
    fn is_deleted(&self) -> bool;
    /// Last update timestamp
    fn updated_at(&self) -> DateTime<Utc>;
    /// Tombstone the entity: set the flag, bump version, refresh `updated_at`
    fn mark_deleted(&mut self);
}

macro_rules! impl_stored_entity {
    (@owning_trip global) => {
        fn owning_trip(&self) -> Option<&str> {
            None
        }
    };
    (@owning_trip trip_scoped) => {
        fn owning_trip(&self) -> Option<&str> {
            Some(&self.trip_id)
        }
    };
    ($type:ty, $table:literal, $kind:expr, $scope:ident) => {
        impl StoredEntity for $type {
            const TABLE: &'static str = $table;
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            impl_stored_entity!(@owning_trip $scope);

            fn version(&self) -> i64 {
                self.version
            }

            fn is_deleted(&self) -> bool {
                self.is_deleted
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn mark_deleted(&mut self) {
                self.is_deleted = true;
                self.touch();
            }
        }
    };
}

impl_stored_entity!(Trip, "trips", EntityKind::Trip, global);
impl_stored_entity!(Person, "people", EntityKind::Person, trip_scoped);
impl_stored_entity!(Item, "items", EntityKind::Item, trip_scoped);
impl_stored_entity!(
    DefaultItemRule,
    "default_item_rules",
    EntityKind::DefaultItemRule,
    global
);
impl_stored_entity!(RulePack, "rule_packs", EntityKind::RulePack, global);
impl_stored_entity!(
    RuleOverride,
    "rule_overrides",
    EntityKind::RuleOverride,
    trip_scoped
);
impl_stored_entity!(TripRule, "trip_rules", EntityKind::TripRule, trip_scoped);

/// Store for durable, indexed entity collections
pub struct EntityStore<'a> {
    conn: &'a Connection,
    mode: PersistenceMode,
}

impl<'a> EntityStore<'a> {
    /// Create a store over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            conn: db.connection(),
            mode: db.mode(),
        }
    }

    /// Upsert an entity by primary id.
    ///
    /// Ids are caller-generated, so no constraint violation is possible.
    pub async fn save<T: StoredEntity>(&self, entity: &T) -> Result<()> {
        if self.mode.is_ephemeral() {
            tracing::debug!(
                table = T::TABLE,
                id = entity.id(),
                "ephemeral mode, dropping write"
            );
            return Ok(());
        }

        let payload = serde_json::to_string(entity)?;
        let trip_id = entity
            .owning_trip()
            .map_or(libsql::Value::Null, |trip_id| {
                libsql::Value::Text(trip_id.to_string())
            });

        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {}
                     (id, trip_id, version, is_deleted, updated_at, payload)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    T::TABLE
                ),
                libsql::params![
                    entity.id(),
                    trip_id,
                    entity.version(),
                    i32::from(entity.is_deleted()),
                    entity.updated_at().to_rfc3339(),
                    payload
                ],
            )
            .await?;

        Ok(())
    }

    /// Get an entity by id, tombstoned or not
    pub async fn get<T: StoredEntity>(&self, id: &str) -> Result<Option<T>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT payload FROM {} WHERE id = ?", T::TABLE),
                libsql::params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let payload: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    /// List a trip's live entities (tombstones excluded)
    pub async fn list_for_trip<T: StoredEntity>(&self, trip_id: &str) -> Result<Vec<T>> {
        self.list_rows::<T>(
            &format!(
                // UUID v7 ids sort by creation time
                "SELECT payload FROM {} WHERE trip_id = ? AND is_deleted = 0 ORDER BY id",
                T::TABLE
            ),
            Some(trip_id),
        )
        .await
    }

    /// List a trip's entities including tombstones (for sync reconciliation)
    pub async fn list_for_trip_with_deleted<T: StoredEntity>(
        &self,
        trip_id: &str,
    ) -> Result<Vec<T>> {
        self.list_rows::<T>(
            &format!(
                "SELECT payload FROM {} WHERE trip_id = ? ORDER BY id",
                T::TABLE
            ),
            Some(trip_id),
        )
        .await
    }

    /// List every live entity of a type (tombstones excluded)
    pub async fn list_all<T: StoredEntity>(&self) -> Result<Vec<T>> {
        self.list_rows::<T>(
            &format!(
                "SELECT payload FROM {} WHERE is_deleted = 0 ORDER BY id",
                T::TABLE
            ),
            None,
        )
        .await
    }

    /// Soft delete an entity: tombstone it and bump its version.
    ///
    /// Deleting a missing or already-tombstoned id is a no-op, not an error.
    pub async fn delete<T: StoredEntity>(&self, id: &str) -> Result<()> {
        let Some(mut entity) = self.get::<T>(id).await? else {
            tracing::debug!(table = T::TABLE, id, "delete of missing entity, no-op");
            return Ok(());
        };

        if entity.is_deleted() {
            tracing::debug!(table = T::TABLE, id, "entity already tombstoned, no-op");
            return Ok(());
        }

        entity.mark_deleted();
        self.save(&entity).await
    }

    async fn list_rows<T: StoredEntity>(
        &self,
        sql: &str,
        trip_id: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut rows = match trip_id {
            Some(trip_id) => self.conn.query(sql, libsql::params![trip_id]).await?,
            None => self.conn.query(sql, ()).await?,
        };

        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            entities.push(serde_json::from_str(&payload)?);
        }
        Ok(entities)
    }
}
