//! Pending change queue repository

use libsql::Connection;

use crate::db::{Database, PersistenceMode};
use crate::error::Result;
use crate::models::Change;

/// Repository over the durable pending-change queue.
///
/// Changes leave the queue only when the remote accepts them; everything else
/// survives restarts.
pub struct ChangeRepository<'a> {
    conn: &'a Connection,
    mode: PersistenceMode,
}

impl<'a> ChangeRepository<'a> {
    /// Create a repository over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            conn: db.connection(),
            mode: db.mode(),
        }
    }

    /// Append a change to the end of the queue
    pub async fn append(&self, change: &Change) -> Result<()> {
        if self.mode.is_ephemeral() {
            tracing::debug!(change_id = %change.id, "ephemeral mode, dropping change");
            return Ok(());
        }

        let payload = serde_json::to_string(change)?;
        let trip_id = change
            .trip_id
            .as_deref()
            .map_or(libsql::Value::Null, |trip_id| {
                libsql::Value::Text(trip_id.to_string())
            });

        self.conn
            .execute(
                "INSERT INTO pending_changes
                 (id, entity_kind, entity_id, operation, user_id, trip_id, version, created_at, payload)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    change.id.as_str(),
                    change.entity_kind().as_str(),
                    change.entity_id(),
                    change.operation.to_string(),
                    change.user_id.as_str(),
                    trip_id,
                    change.version,
                    change.timestamp.to_rfc3339(),
                    payload
                ],
            )
            .await?;

        Ok(())
    }

    /// List pending changes in append order
    pub async fn list_pending(&self) -> Result<Vec<Change>> {
        let mut rows = self
            .conn
            .query("SELECT payload FROM pending_changes ORDER BY seq", ())
            .await?;

        let mut changes = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            changes.push(serde_json::from_str(&payload)?);
        }
        Ok(changes)
    }

    /// Remove a change once the remote has accepted it.
    ///
    /// Removing an unknown id is a no-op.
    pub async fn remove(&self, change_id: &str) -> Result<()> {
        if self.mode.is_ephemeral() {
            return Ok(());
        }

        let removed = self
            .conn
            .execute(
                "DELETE FROM pending_changes WHERE id = ?",
                libsql::params![change_id],
            )
            .await?;

        if removed == 0 {
            tracing::debug!(change_id, "remove of unknown pending change, no-op");
        }
        Ok(())
    }

    /// Number of changes still waiting on the remote
    pub async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_changes", ())
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
    use crate::models::{ChangePayload, Item, Operation};

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn item_change(trip_id: &str, name: &str) -> Change {
        Change::new(
            ChangePayload::Item(Item::new(trip_id, name, "clothing", 1)),
            Operation::Create,
            "u1",
            Some(trip_id.to_string()),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_and_list_preserves_order() {
        let db = setup().await;
        let repo = ChangeRepository::new(&db);

        let first = item_change("t1", "Socks");
        let second = item_change("t1", "Hat");
        repo.append(&first).await.unwrap();
        repo.append(&second).await.unwrap();

        let pending = repo.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_after_remote_accept() {
        let db = setup().await;
        let repo = ChangeRepository::new(&db);

        let change = item_change("t1", "Socks");
        repo.append(&change).await.unwrap();
        assert_eq!(repo.pending_count().await.unwrap(), 1);

        repo.remove(&change.id).await.unwrap();
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_unknown_id_is_a_no_op() {
        let db = setup().await;
        let repo = ChangeRepository::new(&db);

        repo.remove("nope").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kitlist.db");

        let change = item_change("t1", "Socks");
        {
            let db = Database::open(&path).await.unwrap();
            ChangeRepository::new(&db).append(&change).await.unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        let pending = ChangeRepository::new(&db).list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, change.id);
        assert!(!pending[0].synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ephemeral_mode_drops_changes() {
        let db = Database::open_in_memory_with_mode(PersistenceMode::Ephemeral)
            .await
            .unwrap();
        let repo = ChangeRepository::new(&db);

        repo.append(&item_change("t1", "Socks")).await.unwrap();
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }
}
