//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Whether writes reach the durable store.
///
/// `Ephemeral` is the demo/try-out mode: every write becomes a logged no-op
/// while reads still serve whatever rows are already present. It is threaded
/// explicitly through the store constructors so nothing ambient can switch a
/// durable database into demo behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    /// Writes are persisted normally
    #[default]
    Durable,
    /// Writes are dropped; reads still succeed
    Ephemeral,
}

impl PersistenceMode {
    /// Whether writes should be dropped
    #[must_use]
    pub const fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral)
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
    mode: PersistenceMode,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically. Writes are durable.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, PersistenceMode::Durable).await
    }

    /// Open a database at the given path with an explicit persistence mode.
    pub async fn open_with_mode(
        path: impl AsRef<Path>,
        mode: PersistenceMode,
    ) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::finish_open(db, mode).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_mode(PersistenceMode::Durable).await
    }

    /// Open an in-memory database with an explicit persistence mode
    pub async fn open_in_memory_with_mode(mode: PersistenceMode) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::finish_open(db, mode).await
    }

    async fn finish_open(db: LibSqlDatabase, mode: PersistenceMode) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self {
            _db: db,
            conn,
            mode,
        };
        database.configure().await?;
        database.migrate().await?;
        if mode.is_ephemeral() {
            tracing::info!("Database opened in ephemeral mode; writes will be dropped");
        }
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self) -> Result<()> {
        // WAL is unavailable for in-memory databases; ignore errors there
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The persistence mode this database was opened with
    pub const fn mode(&self) -> PersistenceMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.mode(), PersistenceMode::Durable);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_on_disk_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kitlist.db");
        let db = Database::open(&path).await.unwrap();
        drop(db);
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ephemeral_mode_is_reported() {
        let db = Database::open_in_memory_with_mode(PersistenceMode::Ephemeral)
            .await
            .unwrap();
        assert!(db.mode().is_ephemeral());
    }
}
