//! Shared deterministic types for the patch engine.
//!
//! These types define stable contracts between the differ, the codec and the
//! applier. They carry no I/O and compare by value.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::path::KeyPath;
use crate::error::PatchError;
use crate::tree::{self, Map, Value};

/// Reserved top-level key holding [`GlobalActions`] in a patch record.
pub const GLOBAL_ACTIONS_KEY: &str = "__global_actions";

/// Structural difference for one configuration unit.
///
/// `added` and `changed` are nested subtrees merged into the live unit.
/// `deleted` holds flattened leaf paths with the value they had when the
/// patch was generated; only the paths matter when applying.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub added: Map,
    pub changed: Map,
    pub deleted: BTreeMap<KeyPath, Value>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Flattened paths to remove, in key order.
    pub fn deleted_paths(&self) -> impl Iterator<Item = &KeyPath> {
        self.deleted.keys()
    }

    /// Nested form of `deleted`, as written to patch files.
    pub fn deleted_tree(&self) -> Map {
        let mut map = Map::new();
        for (path, old) in &self.deleted {
            tree::set_path(&mut map, path, old.clone());
        }
        map
    }

    /// Inverse of [`Delta::deleted_tree`]: one entry per leaf.
    pub fn deleted_from_tree(map: &Map) -> BTreeMap<KeyPath, Value> {
        tree::leaves(map)
            .into_iter()
            .map(|(path, old)| (path, old.clone()))
            .collect()
    }
}

/// One unit entry of a patch record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPatch {
    /// Configuration unit name, e.g. `field.storage.node.body`.
    pub name: String,
    /// Live values the generator observed for every key it touches.
    pub expected: Map,
    pub delta: Delta,
}

/// Pre-steps executed before any unit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalActions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub install_modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_configs: Vec<String>,
}

impl GlobalActions {
    pub fn is_empty(&self) -> bool {
        self.install_modules.is_empty() && self.import_configs.is_empty()
    }
}

/// Decoded contents of one patch file.
///
/// Units keep their file order. `global_actions` is kept apart because it is
/// always processed first, wherever it appeared in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchRecord {
    pub global_actions: Option<GlobalActions>,
    pub units: Vec<UnitPatch>,
}

impl PatchRecord {
    pub fn is_empty(&self) -> bool {
        self.global_actions.is_none() && self.units.is_empty()
    }

    pub fn unit(&self, name: &str) -> Option<&UnitPatch> {
        self.units.iter().find(|unit| unit.name == name)
    }
}

static MODULE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("module name regex"));
static UPDATE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("update name regex"));

/// Names one patch file: the module that owns it and the update name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId {
    module: String,
    update: String,
}

impl UpdateId {
    /// Validate both parts as machine names (no path separators).
    pub fn new(module: impl Into<String>, update: impl Into<String>) -> Result<Self, PatchError> {
        let module = module.into();
        let update = update.into();
        if !MODULE_NAME_RE.is_match(&module) {
            return Err(PatchError::InvalidId {
                kind: "module",
                value: module,
            });
        }
        if !UPDATE_NAME_RE.is_match(&update) {
            return Err(PatchError::InvalidId {
                kind: "update",
                value: update,
            });
        }
        Ok(Self { module, update })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn update(&self) -> &str {
        &self.update
    }

    /// Key used by the progress ledger: `module:update` with dots replaced.
    pub fn ledger_key(&self) -> String {
        format!("{}:{}", self.module, self.update).replace('.', "_")
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.update)
    }
}

/// Terminal state of one unit within an apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Live unit already matched the patched state; nothing written.
    AlreadyCurrent,
    /// Live unit diverged from the expected snapshot; left untouched.
    ConflictSkipped,
    /// No live unit of that name.
    MissingSkipped,
    /// Delta applied and unit persisted.
    Applied,
    /// The live store could not be read or written for this unit.
    StoreFailed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitState::AlreadyCurrent => "already current",
            UnitState::ConflictSkipped => "conflict, skipped",
            UnitState::MissingSkipped => "missing, skipped",
            UnitState::Applied => "applied",
            UnitState::StoreFailed => "store failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub unit: String,
    pub state: UnitState,
}

/// Aggregate result of one apply run.
///
/// `ok` is true iff no warnings were recorded, so an empty record and a record
/// whose units were all already current both report `ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub id: UpdateId,
    pub ok: bool,
    /// Human-readable warnings in the order they were recorded.
    pub warnings: Vec<String>,
    /// Per-unit outcomes in record order.
    pub units: Vec<UnitOutcome>,
}

impl ApplyReport {
    pub fn new(id: UpdateId, warnings: Vec<String>, units: Vec<UnitOutcome>) -> Self {
        Self {
            id,
            ok: warnings.is_empty(),
            warnings,
            units,
        }
    }

    pub fn state_of(&self, unit: &str) -> Option<UnitState> {
        self.units
            .iter()
            .find(|outcome| outcome.unit == unit)
            .map(|outcome| outcome.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tree;
    use serde_json::json;

    #[test]
    fn update_id_rejects_path_like_names() {
        assert!(UpdateId::new("node", "node_update_8001").is_ok());
        assert!(UpdateId::new("node", "release-1.2").is_ok());
        assert!(matches!(
            UpdateId::new("../node", "x"),
            Err(PatchError::InvalidId { kind: "module", .. })
        ));
        assert!(matches!(
            UpdateId::new("node", "a/b"),
            Err(PatchError::InvalidId { kind: "update", .. })
        ));
        assert!(UpdateId::new("node", "").is_err());
    }

    #[test]
    fn ledger_key_replaces_dots() {
        let id = UpdateId::new("update_helper", "release.1").expect("id");
        assert_eq!(id.ledger_key(), "update_helper:release_1");
        assert_eq!(id.to_string(), "update_helper:release.1");
    }

    #[test]
    fn deleted_tree_round_trips_through_leaves() {
        let nested = tree(json!({"lost_config": "text", "settings": {"max_length": 123}, "empty": {}}));
        let deleted = Delta::deleted_from_tree(&nested);
        assert_eq!(deleted.len(), 3);
        let delta = Delta {
            deleted,
            ..Delta::default()
        };
        assert_eq!(delta.deleted_tree(), nested);
    }

    #[test]
    fn report_ok_only_without_warnings() {
        let id = UpdateId::new("node", "u1").expect("id");
        assert!(ApplyReport::new(id.clone(), Vec::new(), Vec::new()).ok);
        assert!(!ApplyReport::new(id, vec!["w".to_string()], Vec::new()).ok);
    }
}
