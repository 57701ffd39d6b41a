//! Conflict resolution

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::{ConflictRepository, Database};
use crate::error::Result;
use crate::models::SyncConflict;
use crate::util;

/// How a recorded conflict should be settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the local snapshot
    Local,
    /// Keep the server snapshot
    Server,
    /// A human decides; the record stays until they do
    Manual,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Local => "local",
            Self::Server => "server",
            Self::Manual => "manual",
        };
        write!(f, "{label}")
    }
}

/// How sure the heuristic is about its suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Advisory resolution suggestion. Never applied without an explicit
/// caller-issued resolve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionSuggestion {
    /// Suggested strategy
    pub strategy: ResolutionStrategy,
    /// How the suggestion was reached
    pub confidence: Confidence,
    /// Short human-readable rationale
    pub reason: String,
}

/// Stateless facade over the conflict records
pub struct ConflictResolver<'a> {
    conflicts: ConflictRepository<'a>,
}

impl<'a> ConflictResolver<'a> {
    /// Create a resolver over the given database
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self {
            conflicts: ConflictRepository::new(db),
        }
    }

    /// Suggest a resolution for a conflict.
    ///
    /// Prefers the fresher side when both snapshots carry a timestamp (high
    /// confidence), then the more populated side (medium), and otherwise
    /// defers to a human (low).
    #[must_use]
    pub fn suggest(conflict: &SyncConflict) -> ResolutionSuggestion {
        let local_at = snapshot_timestamp(&conflict.local_snapshot);
        let server_at = snapshot_timestamp(&conflict.server_snapshot);
        if let (Some(local_at), Some(server_at)) = (local_at, server_at) {
            let strategy = if local_at >= server_at {
                ResolutionStrategy::Local
            } else {
                ResolutionStrategy::Server
            };
            return ResolutionSuggestion {
                strategy,
                confidence: Confidence::High,
                reason: "more recent timestamp".to_string(),
            };
        }

        let local_keys = populated_key_count(&conflict.local_snapshot);
        let server_keys = populated_key_count(&conflict.server_snapshot);
        if local_keys != server_keys {
            let strategy = if local_keys > server_keys {
                ResolutionStrategy::Local
            } else {
                ResolutionStrategy::Server
            };
            return ResolutionSuggestion {
                strategy,
                confidence: Confidence::Medium,
                reason: "more populated snapshot".to_string(),
            };
        }

        ResolutionSuggestion {
            strategy: ResolutionStrategy::Manual,
            confidence: Confidence::Low,
            reason: "no heuristic applies".to_string(),
        }
    }

    /// Resolve a conflict by strategy.
    ///
    /// `Local` and `Server` delete the record; applying the chosen
    /// authoritative value is the caller's follow-up write (resolution is
    /// two-phase). `Manual` leaves the record untouched; merged data goes
    /// through [`Self::resolve_with_merge`]. Unknown ids are a no-op.
    pub async fn resolve(&self, conflict_id: &str, strategy: ResolutionStrategy) -> Result<()> {
        let Some(conflict) = self.conflicts.get(conflict_id).await? else {
            tracing::debug!(conflict_id, "resolve of unknown conflict, no-op");
            return Ok(());
        };

        match strategy {
            ResolutionStrategy::Local | ResolutionStrategy::Server => {
                tracing::info!(
                    conflict_id,
                    entity_id = %conflict.entity_id,
                    %strategy,
                    "conflict resolved"
                );
                self.conflicts.remove(conflict_id).await
            }
            ResolutionStrategy::Manual => {
                tracing::debug!(conflict_id, "manual strategy keeps the record pending");
                Ok(())
            }
        }
    }

    /// Resolve a conflict with the default merge.
    ///
    /// Deletes the record and returns the merged snapshot for the caller to
    /// persist. Unknown ids are a no-op returning `None`.
    pub async fn resolve_with_merge(&self, conflict_id: &str) -> Result<Option<Value>> {
        let Some(conflict) = self.conflicts.get(conflict_id).await? else {
            tracing::debug!(conflict_id, "merge-resolve of unknown conflict, no-op");
            return Ok(None);
        };

        let merged = merged_snapshot(&conflict.local_snapshot, &conflict.server_snapshot);
        self.conflicts.remove(conflict_id).await?;
        tracing::info!(
            conflict_id,
            entity_id = %conflict.entity_id,
            "conflict resolved by merge"
        );
        Ok(Some(merged))
    }
}

/// Default merge of two snapshots: shallow merge with server-side wins on key
/// collisions, the larger timestamp of the two kept, and provenance metadata
/// recording both sources and the merge time.
#[must_use]
pub fn merged_snapshot(local: &Value, server: &Value) -> Value {
    let mut merged = local.as_object().cloned().unwrap_or_default();
    if let Some(server_map) = server.as_object() {
        for (key, value) in server_map {
            merged.insert(key.clone(), value.clone());
        }
    }

    for field in ["updated_at", "timestamp"] {
        let local_at = local.get(field).filter(|value| !value.is_null());
        let server_at = server.get(field).filter(|value| !value.is_null());
        if let (Some(local_at), Some(server_at)) = (local_at, server_at) {
            let newer = if parse_timestamp(local_at) >= parse_timestamp(server_at) {
                local_at
            } else {
                server_at
            };
            merged.insert(field.to_string(), newer.clone());
        }
    }

    merged.insert(
        "merge_provenance".to_string(),
        json!({
            "merged_at": util::now().to_rfc3339(),
            "local": local,
            "server": server,
        }),
    );

    Value::Object(merged)
}

/// Extract a comparable timestamp from a snapshot, preferring `updated_at`
/// over a bare `timestamp` field.
fn snapshot_timestamp(snapshot: &Value) -> Option<DateTime<Utc>> {
    ["updated_at", "timestamp"]
        .into_iter()
        .find_map(|field| parse_timestamp(snapshot.get(field)?))
}

/// Count the top-level object keys whose value is present and non-null.
fn populated_key_count(snapshot: &Value) -> usize {
    snapshot.as_object().map_or(0, |map| {
        map.values().filter(|value| !value.is_null()).count()
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => raw.parse().ok(),
        // Unix milliseconds, as remote rows may carry
        Value::Number(number) => {
            let millis = number.as_i64()?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, EntityKind};
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn conflict_with(local: Value, server: Value) -> SyncConflict {
        SyncConflict::new(
            EntityKind::Item,
            "i1",
            local,
            server,
            ConflictType::UpdateConflict,
        )
    }

    #[test]
    fn suggest_prefers_fresher_timestamp() {
        let conflict = conflict_with(
            json!({"quantity": 2, "updated_at": "2026-01-01T00:00:00Z"}),
            json!({"quantity": 3, "updated_at": "2026-01-02T00:00:00Z"}),
        );

        let suggestion = ConflictResolver::suggest(&conflict);
        assert_eq!(suggestion.strategy, ResolutionStrategy::Server);
        assert_eq!(suggestion.confidence, Confidence::High);
    }

    #[test]
    fn suggest_falls_back_to_populated_keys() {
        let conflict = conflict_with(
            json!({"quantity": 2, "category": "clothing", "name": "Socks"}),
            json!({"quantity": 3, "category": null}),
        );

        let suggestion = ConflictResolver::suggest(&conflict);
        assert_eq!(suggestion.strategy, ResolutionStrategy::Local);
        assert_eq!(suggestion.confidence, Confidence::Medium);
    }

    #[test]
    fn suggest_defers_to_manual_when_nothing_applies() {
        let conflict = conflict_with(json!({"quantity": 2}), json!({"quantity": 3}));

        let suggestion = ConflictResolver::suggest(&conflict);
        assert_eq!(suggestion.strategy, ResolutionStrategy::Manual);
        assert_eq!(suggestion.confidence, Confidence::Low);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_local_and_server_delete_the_record() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);
        let resolver = ConflictResolver::new(&db);

        for strategy in [ResolutionStrategy::Local, ResolutionStrategy::Server] {
            let conflict = conflict_with(json!({"quantity": 2}), json!({"quantity": 3}));
            repo.record(&conflict).await.unwrap();

            resolver.resolve(&conflict.id, strategy).await.unwrap();
            assert_eq!(repo.count().await.unwrap(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_manual_strategy_keeps_the_record() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);
        let resolver = ConflictResolver::new(&db);

        let conflict = conflict_with(json!({"quantity": 2}), json!({"quantity": 3}));
        repo.record(&conflict).await.unwrap();

        resolver
            .resolve(&conflict.id, ResolutionStrategy::Manual)
            .await
            .unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_unknown_id_is_a_no_op() {
        let db = setup().await;
        let resolver = ConflictResolver::new(&db);

        resolver
            .resolve("nope", ResolutionStrategy::Server)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_with_merge_returns_merged_and_deletes() {
        let db = setup().await;
        let repo = ConflictRepository::new(&db);
        let resolver = ConflictResolver::new(&db);

        let conflict = conflict_with(
            json!({"quantity": 2, "name": "Socks"}),
            json!({"quantity": 3}),
        );
        repo.record(&conflict).await.unwrap();

        let merged = resolver
            .resolve_with_merge(&conflict.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged["quantity"], 3);
        assert_eq!(merged["name"], "Socks");
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[test]
    fn merged_snapshot_keeps_larger_timestamp_and_provenance() {
        let local = json!({"quantity": 2, "updated_at": "2026-01-05T00:00:00Z"});
        let server = json!({"quantity": 3, "updated_at": "2026-01-02T00:00:00Z"});

        let merged = merged_snapshot(&local, &server);

        // Server wins the colliding field, but the fresher timestamp is kept
        assert_eq!(merged["quantity"], 3);
        assert_eq!(merged["updated_at"], "2026-01-05T00:00:00Z");
        assert_eq!(merged["merge_provenance"]["local"]["quantity"], 2);
        assert_eq!(merged["merge_provenance"]["server"]["quantity"], 3);
        assert!(merged["merge_provenance"]["merged_at"].is_string());
    }
}
