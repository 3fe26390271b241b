//! Semantic invariants of unit patches not expressible in the patch format.

use std::collections::BTreeSet;

use crate::core::path::{KeyPath, flat_keys};
use crate::core::types::UnitPatch;
use crate::tree::Map;

/// Check the invariants of one unit entry:
/// - No path is both deleted and added/changed.
/// - No path is both added and changed.
///
/// Returns a list of stable error messages (in key order).
pub fn validate_unit(unit: &UnitPatch) -> Vec<String> {
    let mut errors = Vec::new();
    let added = leaf_paths(&unit.delta.added);
    let changed = leaf_paths(&unit.delta.changed);

    for path in unit.delta.deleted_paths() {
        if added.contains(path) || changed.contains(path) {
            errors.push(format!(
                "{}: path '{}' is both deleted and set",
                unit.name, path
            ));
        }
    }
    for path in added.intersection(&changed) {
        errors.push(format!(
            "{}: path '{}' is both added and changed",
            unit.name, path
        ));
    }

    errors
}

fn leaf_paths(map: &Map) -> BTreeSet<KeyPath> {
    flat_keys(map).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{delta, tree};
    use serde_json::json;

    #[test]
    fn disjoint_parts_are_valid() {
        let unit = UnitPatch {
            name: "field.storage.node.body".to_string(),
            expected: tree(json!({"settings": {"max_length": 123}})),
            delta: delta(
                json!({"cardinality": 1}),
                json!({"settings": {}}),
                json!({"settings": {"max_length": 123}}),
            ),
        };
        assert!(validate_unit(&unit).is_empty());
    }

    #[test]
    fn overlapping_paths_are_reported() {
        let unit = UnitPatch {
            name: "system.site".to_string(),
            expected: tree(json!({})),
            delta: delta(
                json!({"name": "a", "slogan": "x"}),
                json!({"name": "b"}),
                json!({"slogan": "old"}),
            ),
        };
        let errors = validate_unit(&unit);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|err| err.contains("'slogan' is both deleted")));
        assert!(errors.iter().any(|err| err.contains("'name' is both added and changed")));
    }
}
