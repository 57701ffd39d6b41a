//! Structural snapshot comparison

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::models::{ConflictType, EntityKind, SyncConflict};

/// Classification of one differing path between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Present on the server side only
    Added,
    /// Present on the local side only
    Removed,
    /// Present on both sides with different values
    Modified,
}

/// One differing path between a local and a server snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    /// Dotted key path from the snapshot root
    pub path: String,
    /// Difference classification
    pub kind: DiffKind,
    /// Local value at the path, when present
    pub local_value: Option<Value>,
    /// Server value at the path, when present
    pub server_value: Option<Value>,
}

/// Recursive, key-order-independent deep equality.
///
/// Arrays compare by length plus index-wise recursion. A key mapped to `null`
/// is equivalent to the key being absent on the other side.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
            keys.into_iter().all(|key| {
                let lv = left.get(key).filter(|value| !value.is_null());
                let rv = right.get(key).filter(|value| !value.is_null());
                match (lv, rv) {
                    (None, None) => true,
                    (Some(lv), Some(rv)) => deep_equal(lv, rv),
                    _ => false,
                }
            })
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(lv, rv)| deep_equal(lv, rv))
        }
        _ => a == b,
    }
}

/// Walk both snapshots' key sets and report every differing path.
///
/// Top-level differences are classified `added`/`removed`/`modified`; plain
/// nested objects are walked recursively so the report names the deepest
/// differing paths. Swapping the arguments swaps sides on each diff.
#[must_use]
pub fn diff_snapshots(local: &Value, server: &Value) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    collect_diffs("", local, server, &mut diffs);
    diffs
}

fn collect_diffs(prefix: &str, local: &Value, server: &Value, out: &mut Vec<FieldDiff>) {
    let (Value::Object(left), Value::Object(right)) = (local, server) else {
        if !deep_equal(local, server) {
            out.push(FieldDiff {
                path: prefix.to_string(),
                kind: DiffKind::Modified,
                local_value: Some(local.clone()),
                server_value: Some(server.clone()),
            });
        }
        return;
    };

    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    for key in keys {
        let lv = left.get(key).filter(|value| !value.is_null());
        let sv = right.get(key).filter(|value| !value.is_null());
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match (lv, sv) {
            (None, None) => {}
            (None, Some(sv)) => out.push(FieldDiff {
                path,
                kind: DiffKind::Added,
                local_value: None,
                server_value: Some(sv.clone()),
            }),
            (Some(lv), None) => out.push(FieldDiff {
                path,
                kind: DiffKind::Removed,
                local_value: Some(lv.clone()),
                server_value: None,
            }),
            (Some(lv), Some(sv)) => {
                if deep_equal(lv, sv) {
                    continue;
                }
                if lv.is_object() && sv.is_object() {
                    collect_diffs(&path, lv, sv, out);
                } else {
                    out.push(FieldDiff {
                        path,
                        kind: DiffKind::Modified,
                        local_value: Some(lv.clone()),
                        server_value: Some(sv.clone()),
                    });
                }
            }
        }
    }
}

/// Compare two snapshots of one entity and build a conflict on divergence.
///
/// A side carrying a truthy `is_deleted` makes the divergence a
/// `delete_conflict`; otherwise it is an `update_conflict`.
#[must_use]
pub fn detect_conflict(
    entity_kind: EntityKind,
    entity_id: &str,
    local: &Value,
    server: &Value,
) -> Option<SyncConflict> {
    if deep_equal(local, server) {
        return None;
    }

    let tombstoned = |snapshot: &Value| {
        snapshot
            .get("is_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let conflict_type = if tombstoned(local) || tombstoned(server) {
        ConflictType::DeleteConflict
    } else {
        ConflictType::UpdateConflict
    };

    tracing::debug!(
        entity_kind = %entity_kind,
        entity_id,
        conflict_type = %conflict_type,
        "snapshot divergence detected"
    );

    Some(SyncConflict::new(
        entity_kind,
        entity_id,
        local.clone(),
        server.clone(),
        conflict_type,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deep_equal_ignores_key_order() {
        assert!(deep_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
    }

    #[test]
    fn deep_equal_treats_null_as_absent() {
        assert!(deep_equal(&json!({"a": 1, "b": null}), &json!({"a": 1})));
        assert!(deep_equal(&json!({"a": null}), &json!({})));
    }

    #[test]
    fn deep_equal_compares_arrays_index_wise() {
        assert!(deep_equal(&json!([1, 2, 3]), &json!([1, 2, 3])));
        assert!(!deep_equal(&json!([1, 2, 3]), &json!([1, 3, 2])));
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn deep_equal_recurses_into_nested_objects() {
        assert!(deep_equal(
            &json!({"outer": {"a": 1, "b": null}}),
            &json!({"outer": {"a": 1}})
        ));
        assert!(!deep_equal(
            &json!({"outer": {"a": 1}}),
            &json!({"outer": {"a": 2}})
        ));
    }

    #[test]
    fn diff_classifies_added_removed_modified() {
        let local = json!({"keep": 1, "gone": "x", "changed": 1});
        let server = json!({"keep": 1, "fresh": "y", "changed": 2});

        let diffs = diff_snapshots(&local, &server);
        let by_path = |path: &str| diffs.iter().find(|diff| diff.path == path).unwrap();

        assert_eq!(diffs.len(), 3);
        assert_eq!(by_path("gone").kind, DiffKind::Removed);
        assert_eq!(by_path("fresh").kind, DiffKind::Added);
        assert_eq!(by_path("changed").kind, DiffKind::Modified);
        assert_eq!(by_path("changed").local_value, Some(json!(1)));
        assert_eq!(by_path("changed").server_value, Some(json!(2)));
    }

    #[test]
    fn diff_reports_nested_paths() {
        let local = json!({"conditions": {"min_temp_c": 5, "tags": ["beach"]}});
        let server = json!({"conditions": {"min_temp_c": 10, "tags": ["beach"]}});

        let diffs = diff_snapshots(&local, &server);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "conditions.min_temp_c");
        assert_eq!(diffs[0].kind, DiffKind::Modified);
    }

    #[test]
    fn diff_is_symmetric_up_to_side_swap() {
        let a = json!({"x": 1, "only_a": true, "nested": {"y": "l"}});
        let b = json!({"x": 2, "only_b": true, "nested": {"y": "s"}});

        let forward = diff_snapshots(&a, &b);
        let backward = diff_snapshots(&b, &a);

        let mut forward_paths: Vec<&str> = forward.iter().map(|d| d.path.as_str()).collect();
        let mut backward_paths: Vec<&str> = backward.iter().map(|d| d.path.as_str()).collect();
        forward_paths.sort_unstable();
        backward_paths.sort_unstable();
        assert_eq!(forward_paths, backward_paths);

        for diff in &forward {
            let mirrored = backward.iter().find(|d| d.path == diff.path).unwrap();
            assert_eq!(diff.local_value, mirrored.server_value);
            assert_eq!(diff.server_value, mirrored.local_value);
        }
    }

    #[test]
    fn detect_conflict_skips_equal_snapshots() {
        let snapshot = json!({"a": 1, "b": [1, 2]});
        assert!(detect_conflict(EntityKind::Item, "i1", &snapshot, &snapshot).is_none());
        // Key order and null-vs-absent noise never raise conflicts
        assert!(detect_conflict(
            EntityKind::Item,
            "i1",
            &json!({"a": 1, "b": null}),
            &json!({"a": 1})
        )
        .is_none());
    }

    #[test]
    fn detect_conflict_classifies_update_and_delete() {
        let update = detect_conflict(
            EntityKind::Item,
            "i1",
            &json!({"quantity": 2}),
            &json!({"quantity": 3}),
        )
        .unwrap();
        assert_eq!(update.conflict_type, ConflictType::UpdateConflict);

        let delete = detect_conflict(
            EntityKind::Item,
            "i1",
            &json!({"quantity": 2, "is_deleted": false}),
            &json!({"quantity": 2, "is_deleted": true}),
        )
        .unwrap();
        assert_eq!(delete.conflict_type, ConflictType::DeleteConflict);
    }
}
