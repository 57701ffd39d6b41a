//! Conflict record repository

use libsql::Connection;

use crate::db::{Database, PersistenceMode};
use crate::error::Result;
use crate::models::SyncConflict;

/// Repository over recorded, unresolved sync conflicts.
///
/// The table keeps at most one row per `(entity_kind, entity_id)`; recording
/// a new conflict for the same entity replaces the stale one.
pub struct ConflictRepository<'a> {
    conn: &'a Connection,
    mode: PersistenceMode,
}

impl<'a> ConflictRepository<'a> {
    /// Create a repository over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            conn: db.connection(),
            mode: db.mode(),
        }
    }

    /// Record a conflict, replacing any unresolved one for the same entity
    pub async fn record(&self, conflict: &SyncConflict) -> Result<()> {
        if self.mode.is_ephemeral() {
            tracing::debug!(conflict_id = %conflict.id, "ephemeral mode, dropping conflict");
            return Ok(());
        }

        let payload = serde_json::to_string(conflict)?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_conflicts
                 (id, entity_kind, entity_id, conflict_type, created_at, payload)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    conflict.id.as_str(),
                    conflict.entity_kind.as_str(),
                    conflict.entity_id.as_str(),
                    conflict.conflict_type.as_str(),
                    conflict.timestamp.to_rfc3339(),
                    payload
                ],
            )
            .await?;

        Ok(())
    }

    /// Get a conflict by id
    pub async fn get(&self, id: &str) -> Result<Option<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM sync_conflicts WHERE id = ?",
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

    /// List unresolved conflicts, oldest first
    pub async fn list(&self) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query("SELECT payload FROM sync_conflicts ORDER BY created_at", ())
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            conflicts.push(serde_json::from_str(&payload)?);
        }
        Ok(conflicts)
    }

    /// Delete a resolved conflict. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) -> Result<()> {
        if self.mode.is_ephemeral() {
            return Ok(());
        }

        let removed = self
            .conn
            .execute(
                "DELETE FROM sync_conflicts WHERE id = ?",
                libsql::params![id],
            )
            .await?;

        if removed == 0 {
            tracing::debug!(conflict_id = id, "remove of unknown conflict, no-op");
        }
        Ok(())
    }

    /// Number of unresolved conflicts
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_conflicts", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, EntityKind};
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn item_conflict(entity_id: &str, local_quantity: u32) -> SyncConflict {
        SyncConflict::new(
            EntityKind::Item,
            entity_id,
            json!({"quantity": local_quantity}),
            json!({"quantity": local_quantity + 1}),
            ConflictType::UpdateConflict,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_and_list() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);

        let conflict = item_conflict("i1", 2);
        repo.record(&conflict).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, conflict.id);
        assert_eq!(listed[0].local_snapshot["quantity"], 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_at_most_one_conflict_per_entity() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);

        let stale = item_conflict("i1", 2);
        let fresh = item_conflict("i1", 5);
        repo.record(&stale).await.unwrap();
        repo.record(&fresh).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, fresh.id);
        assert!(repo.get(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_deletes_record() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);

        let conflict = item_conflict("i1", 2);
        repo.record(&conflict).await.unwrap();
        repo.remove(&conflict.id).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_unknown_id_is_a_no_op() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);

        repo.remove("nope").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
