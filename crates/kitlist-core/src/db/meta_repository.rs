//! Sync metadata repository

use chrono::{DateTime, Utc};
use libsql::Connection;

use crate::db::{Database, PersistenceMode};
use crate::error::Result;
use crate::util;

const KEY_LAST_SYNC_AT: &str = "last_sync_at";
const KEY_DEVICE_ID: &str = "device_id";

/// Repository over the single-row-per-key sync metadata collection
pub struct MetaRepository<'a> {
    conn: &'a Connection,
    mode: PersistenceMode,
}

impl<'a> MetaRepository<'a> {
    /// Create a repository over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            conn: db.connection(),
            mode: db.mode(),
        }
    }

    /// Timestamp of the last completed sync, if any
    pub async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.get(KEY_LAST_SYNC_AT).await? else {
            return Ok(None);
        };

        match raw.parse::<DateTime<Utc>>() {
            Ok(at) => Ok(Some(at)),
            Err(error) => {
                tracing::warn!(%error, %raw, "unreadable last_sync_at, treating as never synced");
                Ok(None)
            }
        }
    }

    /// Record the completion time of a sync
    pub async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.set(KEY_LAST_SYNC_AT, &at.to_rfc3339()).await
    }

    /// Stable per-device identifier, minted on first use.
    ///
    /// In ephemeral mode a fresh id is returned without being persisted.
    pub async fn device_id(&self) -> Result<String> {
        if let Some(existing) = self.get(KEY_DEVICE_ID).await? {
            return Ok(existing);
        }

        let minted = util::new_device_id();
        self.set(KEY_DEVICE_ID, &minted).await?;
        Ok(minted)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_meta WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.mode.is_ephemeral() {
            tracing::debug!(key, "ephemeral mode, dropping metadata write");
            return Ok(());
        }

        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
