//! Sync orchestration.
//!
//! Composes the persistent store and the connectivity monitor into a single
//! observable [`SyncState`]. The orchestrator performs no network pull/push
//! itself (an external transport does), but it is the one place that observes
//! their results (conflict and pending-change writes) and fans them out to
//! subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;

use crate::conflict::{detect_conflict, ConflictResolver, ResolutionStrategy};
use crate::connectivity::{
    ConnectivityConfig, ConnectivityMonitor, ConnectivityState, HttpReachabilityProbe,
    ReachabilityProbe,
};
use crate::db::{
    ChangeRepository, ConflictRepository, Database, EntityStore, MetaRepository, StoredEntity,
};
use crate::error::Result;
use crate::models::{EntityKind, SyncConflict};
use crate::state::SyncState;

/// Explicit service registry built once by the composition root and passed by
/// reference to every consumer.
pub struct SyncRegistry<P = HttpReachabilityProbe> {
    /// Shared database handle
    pub db: Arc<Database>,
    /// Connectivity monitor handle
    pub connectivity: ConnectivityMonitor<P>,
    /// Sync orchestrator
    pub sync: SyncService<P>,
}

impl SyncRegistry<HttpReachabilityProbe> {
    /// Wire up the registry with the HTTP reachability probe
    #[must_use]
    pub fn new(db: Database, config: ConnectivityConfig) -> Self {
        let db = Arc::new(db);
        let connectivity = ConnectivityMonitor::with_default_probe(config);
        let sync = SyncService::new(Arc::clone(&db), connectivity.clone());
        Self {
            db,
            connectivity,
            sync,
        }
    }
}

impl<P: ReachabilityProbe> SyncRegistry<P> {
    /// Wire up the registry with an explicit probe implementation
    #[must_use]
    pub fn with_probe(db: Database, config: ConnectivityConfig, probe: P) -> Self {
        let db = Arc::new(db);
        let connectivity = ConnectivityMonitor::new(probe, config);
        let sync = SyncService::new(Arc::clone(&db), connectivity.clone());
        Self {
            db,
            connectivity,
            sync,
        }
    }
}

/// Sync orchestrator: composes [`SyncState`] and exposes the subscription and
/// conflict-resolution entry points.
pub struct SyncService<P = HttpReachabilityProbe> {
    db: Arc<Database>,
    connectivity: ConnectivityMonitor<P>,
    state_tx: watch::Sender<SyncState>,
    is_syncing: Arc<AtomicBool>,
    listener: tokio::task::JoinHandle<()>,
}

impl<P: ReachabilityProbe> SyncService<P> {
    /// Create the orchestrator and start re-publishing state on every
    /// connectivity transition.
    #[must_use]
    pub fn new(db: Arc<Database>, connectivity: ConnectivityMonitor<P>) -> Self {
        let (state_tx, _) = watch::channel(SyncState::default());
        let is_syncing = Arc::new(AtomicBool::new(false));

        let listener = {
            let db = Arc::clone(&db);
            let state_tx = state_tx.clone();
            let is_syncing = Arc::clone(&is_syncing);
            let mut connectivity_rx = connectivity.subscribe();
            tokio::spawn(async move {
                while connectivity_rx.changed().await.is_ok() {
                    let connectivity_state = *connectivity_rx.borrow();
                    match compose_state(
                        &db,
                        connectivity_state,
                        is_syncing.load(Ordering::SeqCst),
                    )
                    .await
                    {
                        Ok(state) => {
                            state_tx.send_replace(state);
                        }
                        Err(error) => {
                            tracing::warn!(%error, "sync state refresh failed after connectivity change");
                        }
                    }
                }
            })
        };

        Self {
            db,
            connectivity,
            state_tx,
            is_syncing,
            listener,
        }
    }

    /// Compose a fresh state snapshot from the store and the monitor
    pub async fn sync_state(&self) -> Result<SyncState> {
        compose_state(
            &self.db,
            self.connectivity.state(),
            self.is_syncing.load(Ordering::SeqCst),
        )
        .await
    }

    /// Subscribe to sync state.
    ///
    /// The receiver holds the current state immediately and observes every
    /// published change; dropping it unsubscribes.
    pub async fn subscribe(&self) -> Result<watch::Receiver<SyncState>> {
        // Publish a fresh snapshot so new subscribers never see a stale default
        self.refresh().await?;
        Ok(self.state_tx.subscribe())
    }

    /// Mark the start of an external sync pass
    pub async fn begin_sync(&self) -> Result<()> {
        self.is_syncing.store(true, Ordering::SeqCst);
        self.refresh().await?;
        Ok(())
    }

    /// Mark the end of an external sync pass, stamping its completion time
    pub async fn finish_sync(&self, at: DateTime<Utc>) -> Result<()> {
        MetaRepository::new(&self.db).set_last_sync_at(at).await?;
        self.is_syncing.store(false, Ordering::SeqCst);
        self.refresh().await?;
        Ok(())
    }

    /// Remove a pending change the remote has accepted
    pub async fn mark_change_synced(&self, change_id: &str) -> Result<()> {
        ChangeRepository::new(&self.db).remove(change_id).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Store an entity snapshot pulled from the remote
    pub async fn apply_remote_entity<T: StoredEntity>(&self, entity: &T) -> Result<()> {
        EntityStore::new(&self.db).save(entity).await
    }

    /// Compare a local and a remote snapshot; record and publish a conflict
    /// on divergence. Returns the recorded conflict, if any.
    pub async fn detect_and_record(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        local: &Value,
        server: &Value,
    ) -> Result<Option<SyncConflict>> {
        let Some(conflict) = detect_conflict(entity_kind, entity_id, local, server) else {
            return Ok(None);
        };
        self.record_conflict(&conflict).await?;
        Ok(Some(conflict))
    }

    /// Record a conflict built by the external transport
    pub async fn record_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        ConflictRepository::new(&self.db).record(conflict).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Resolve a conflict by strategy, then notify subscribers
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
    ) -> Result<()> {
        ConflictResolver::new(&self.db)
            .resolve(conflict_id, strategy)
            .await?;
        self.refresh().await?;
        Ok(())
    }

    /// Resolve a conflict with the default merge, then notify subscribers.
    ///
    /// Returns the merged snapshot for the caller to persist.
    pub async fn resolve_conflict_with_merge(&self, conflict_id: &str) -> Result<Option<Value>> {
        let merged = ConflictResolver::new(&self.db)
            .resolve_with_merge(conflict_id)
            .await?;
        self.refresh().await?;
        Ok(merged)
    }

    async fn refresh(&self) -> Result<()> {
        let state = self.sync_state().await?;
        self.state_tx.send_replace(state);
        Ok(())
    }
}

impl<P> Drop for SyncService<P> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn compose_state(
    db: &Database,
    connectivity: ConnectivityState,
    is_syncing: bool,
) -> Result<SyncState> {
    let pending_changes = ChangeRepository::new(db).list_pending().await?;
    let conflicts = ConflictRepository::new(db).list().await?;
    let last_sync_at = MetaRepository::new(db).last_sync_at().await?;

    Ok(SyncState {
        last_sync_at,
        pending_changes,
        is_online: connectivity.is_online,
        is_syncing,
        conflicts,
    })
}
