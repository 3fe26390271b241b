//! Pure per-unit apply logic: the already-current and conflict checks, and
//! delta application.

use crate::core::path::KeyPath;
use crate::core::types::Delta;
use crate::tree::{self, Map};

/// Decision for one unit before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitCheck {
    /// Live already holds the patched state.
    AlreadyCurrent,
    /// Live diverged from the expected snapshot at these paths.
    Conflict(Vec<KeyPath>),
    Applicable,
}

/// Classify a live unit against one patch entry.
///
/// The unit is already current when live contains the expected snapshot with
/// the delta applied and none of the deleted paths resolve. Otherwise a
/// non-empty snapshot must be contained in live for the delta to apply.
pub fn check_unit(expected: &Map, delta: &Delta, live: &Map) -> UnitCheck {
    let mut target = expected.clone();
    apply_delta(&mut target, delta);
    let deletions_done = delta
        .deleted_paths()
        .all(|path| tree::get_path(live, path).is_none());
    if deletions_done && tree::contains(live, &target) {
        return UnitCheck::AlreadyCurrent;
    }

    if !expected.is_empty() && !tree::contains(live, expected) {
        return UnitCheck::Conflict(tree::mismatched_paths(live, expected));
    }
    UnitCheck::Applicable
}

/// Delete every flattened path, then deep-merge `added`, then `changed`.
pub fn apply_delta(unit: &mut Map, delta: &Delta) {
    for path in delta.deleted_paths() {
        tree::delete_path(unit, path);
    }
    tree::merge_deep(unit, &delta.added);
    tree::merge_deep(unit, &delta.changed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{delta, path, tree};
    use serde_json::json;

    fn field_storage_delta() -> Delta {
        delta(
            json!({"cardinality": 1}),
            json!({"settings": {}, "status": true, "type": "text_with_summary"}),
            json!({"lost_config": "text", "settings": {"max_length": 123}}),
        )
    }

    fn field_storage_expected() -> Map {
        tree(json!({
            "lost_config": "text",
            "settings": {"max_length": 123},
            "status": false,
            "type": "text"
        }))
    }

    #[test]
    fn deep_merge_field_storage() {
        let mut live = field_storage_expected();
        apply_delta(&mut live, &field_storage_delta());
        assert_eq!(
            live,
            tree(json!({
                "status": true,
                "type": "text_with_summary",
                "settings": {},
                "cardinality": 1
            }))
        );
    }

    #[test]
    fn drifted_unit_is_applicable_then_current() {
        let expected = field_storage_expected();
        let delta = field_storage_delta();
        let mut live = expected.clone();
        live.insert("id".to_string(), "node.body".into());

        assert_eq!(check_unit(&expected, &delta, &live), UnitCheck::Applicable);
        apply_delta(&mut live, &delta);
        assert_eq!(check_unit(&expected, &delta, &live), UnitCheck::AlreadyCurrent);
    }

    #[test]
    fn diverged_snapshot_is_a_conflict() {
        let expected = tree(json!({"status": false}));
        let delta = delta(json!({}), json!({"status": "enabled"}), json!({}));
        let live = tree(json!({"status": true}));
        assert_eq!(
            check_unit(&expected, &delta, &live),
            UnitCheck::Conflict(vec![path(&["status"])])
        );
    }

    #[test]
    fn remaining_deleted_path_is_not_current() {
        let expected = tree(json!({"old": 1}));
        let delta = delta(json!({}), json!({}), json!({"old": 1}));
        let live = tree(json!({"old": 1, "keep": true}));
        assert_eq!(check_unit(&expected, &delta, &live), UnitCheck::Applicable);

        let live = tree(json!({"keep": true}));
        assert_eq!(check_unit(&expected, &delta, &live), UnitCheck::AlreadyCurrent);
    }

    #[test]
    fn empty_snapshot_never_conflicts() {
        let delta = delta(json!({"name": "Site"}), json!({}), json!({}));
        let live = tree(json!({"name": "Other"}));
        assert_eq!(check_unit(&Map::new(), &delta, &live), UnitCheck::Applicable);
    }

    #[test]
    fn empty_map_in_snapshot_accepts_any_live_map() {
        let expected = tree(json!({"settings": {}, "status": false}));
        let delta = delta(json!({}), json!({"status": true}), json!({}));
        let mut live = tree(json!({"settings": {"max_length": 5}, "status": false}));
        assert_eq!(check_unit(&expected, &delta, &live), UnitCheck::Applicable);

        apply_delta(&mut live, &delta);
        assert_eq!(
            live,
            tree(json!({"settings": {"max_length": 5}, "status": true}))
        );
    }

    #[test]
    fn deleting_missing_paths_is_ignored() {
        let mut live = tree(json!({"a": {"b": 1}}));
        let delta = delta(json!({}), json!({}), json!({"a": {"c": 2}, "x": {"y": 3}}));
        apply_delta(&mut live, &delta);
        assert_eq!(live, tree(json!({"a": {"b": 1}})));
    }
}
