//! Structural diff between a desired baseline unit and a live unit.

use crate::core::path::KeyPath;
use crate::core::types::Delta;
use crate::tree::{self, Map, Value};

/// Delta that turns `live` into `baseline`, plus the live values it touches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitDiff {
    /// Snapshot of every live value the delta changes or deletes.
    pub expected: Map,
    pub delta: Delta,
}

impl UnitDiff {
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Compute the delta from `live` to `baseline`.
///
/// - A baseline leaf whose position is occupied in `live` (by the same path,
///   or by a live leaf at one of its prefixes) and differs is `changed`; the
///   occupying live value goes into the snapshot.
/// - A baseline leaf on a branch `live` does not have at all is `added`.
/// - A live leaf with nothing at its path in `baseline` is `deleted`, one
///   flattened path per leaf, and goes into the snapshot.
///
/// Identical subtrees produce nothing. Scalars compare by exact, typed
/// equality.
pub fn diff(baseline: &Map, live: &Map) -> UnitDiff {
    let mut out = UnitDiff::default();

    for (path, desired) in tree::leaves(baseline) {
        match live_anchor(live, &path) {
            Some((anchor, current)) => {
                if anchor == path && current == desired {
                    continue;
                }
                tree::set_path(&mut out.delta.changed, &path, desired.clone());
                tree::set_path(&mut out.expected, &anchor, current.clone());
            }
            None => tree::set_path(&mut out.delta.added, &path, desired.clone()),
        }
    }

    for (path, current) in tree::leaves(live) {
        if tree::get_path(baseline, &path).is_none() {
            tree::set_path(&mut out.expected, &path, current.clone());
            out.delta.deleted.insert(path, current.clone());
        }
    }

    out
}

/// Locate the live value occupying `path`: the value at `path` itself, or a
/// live leaf (scalar, list or empty map) at one of its prefixes. `None` when
/// the walk reaches a non-empty map that lacks the next segment.
fn live_anchor<'a>(live: &'a Map, path: &KeyPath) -> Option<(KeyPath, &'a Value)> {
    let segments = path.segments();
    let mut map = live;
    for (depth, segment) in segments.iter().enumerate() {
        let value = map.get(segment)?;
        let reached = depth + 1;
        if reached == segments.len() {
            return Some((path.clone(), value));
        }
        match value {
            Value::Map(inner) if !inner.is_empty() => map = inner,
            _ => return Some((path.prefix(reached), value)),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{path, tree};
    use serde_json::json;

    #[test]
    fn new_branches_are_added_as_nested_subtrees() {
        let baseline = tree(json!({"a": {"b": {"c": "c1"}, "bb": "bb1"}, "aa": "aa1"}));
        let live = tree(json!({"aa": "aa1"}));
        let result = diff(&baseline, &live);
        assert_eq!(
            result.delta.added,
            tree(json!({"a": {"b": {"c": "c1"}, "bb": "bb1"}}))
        );
        assert!(result.delta.changed.is_empty());
        assert!(result.delta.deleted.is_empty());
        assert!(result.expected.is_empty());
    }

    #[test]
    fn removed_leaves_are_deleted_one_path_each() {
        let baseline = tree(json!({"a": {"keep": 1}}));
        let live = tree(json!({"a": {"b": {"c": "c1"}, "bb": "bb1", "keep": 1}}));
        let result = diff(&baseline, &live);
        let deleted: Vec<&KeyPath> = result.delta.deleted_paths().collect();
        assert_eq!(deleted, vec![&path(&["a", "b", "c"]), &path(&["a", "bb"])]);
        assert_eq!(
            result.expected,
            tree(json!({"a": {"b": {"c": "c1"}, "bb": "bb1"}}))
        );
        assert!(result.delta.added.is_empty());
        assert!(result.delta.changed.is_empty());
    }

    #[test]
    fn identical_trees_produce_nothing() {
        let unit = tree(json!({"a": {"b": [1, 2]}, "e": {}, "n": null}));
        let result = diff(&unit, &unit);
        assert!(result.is_empty());
        assert!(result.expected.is_empty());
    }

    #[test]
    fn scalar_types_are_preserved() {
        let baseline = tree(json!({"status": true, "weight": 1}));
        let live = tree(json!({"status": "true", "weight": 1.0}));
        let result = diff(&baseline, &live);
        assert_eq!(result.delta.changed, tree(json!({"status": true, "weight": 1})));
        assert_eq!(result.expected, tree(json!({"status": "true", "weight": 1.0})));
    }

    /// Field storage example: active config drifted from the module baseline.
    #[test]
    fn field_storage_drift_yields_full_patch() {
        let baseline = tree(json!({
            "id": "node.body",
            "cardinality": 1,
            "settings": {},
            "status": true,
            "type": "text_with_summary"
        }));
        let live = tree(json!({
            "id": "node.body",
            "lost_config": "text",
            "settings": {"max_length": 123},
            "status": false,
            "type": "text"
        }));
        let result = diff(&baseline, &live);
        assert_eq!(
            result.expected,
            tree(json!({
                "lost_config": "text",
                "settings": {"max_length": 123},
                "status": false,
                "type": "text"
            }))
        );
        assert_eq!(result.delta.added, tree(json!({"cardinality": 1})));
        assert_eq!(
            result.delta.changed,
            tree(json!({"settings": {}, "status": true, "type": "text_with_summary"}))
        );
        assert_eq!(
            result.delta.deleted_tree(),
            tree(json!({"lost_config": "text", "settings": {"max_length": 123}}))
        );
    }

    /// A live empty map or scalar occupying a prefix makes the new leaf a change.
    #[test]
    fn leaf_occupying_prefix_is_changed() {
        let baseline = tree(json!({"settings": {"max_length": 321}, "a": {"b": {"c": 1}}}));
        let live = tree(json!({"settings": {}, "a": {"b": "x"}}));
        let result = diff(&baseline, &live);
        assert!(result.delta.added.is_empty());
        assert!(result.delta.deleted.is_empty());
        assert_eq!(result.delta.changed, baseline);
        assert_eq!(result.expected, live);
    }

    #[test]
    fn map_replaced_by_scalar_deletes_children() {
        let baseline = tree(json!({"a": {"b": "x"}}));
        let live = tree(json!({"a": {"b": {"c": 1}}}));
        let result = diff(&baseline, &live);
        assert_eq!(result.delta.changed, tree(json!({"a": {"b": "x"}})));
        let deleted: Vec<&KeyPath> = result.delta.deleted_paths().collect();
        assert_eq!(deleted, vec![&path(&["a", "b", "c"])]);
        assert_eq!(result.expected, live);
    }
}
