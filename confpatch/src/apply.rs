//! Orchestration for applying one patch record to live configuration.
//!
//! Global actions run first. Each unit is then checked and patched on its
//! own: a missing unit, a diverged snapshot or a store failure skips that unit
//! with a warning and the run continues. Only a missing or malformed patch
//! file aborts.

use tracing::{debug, info, instrument, warn};

use crate::core::apply::{UnitCheck, apply_delta, check_unit};
use crate::core::path::join_paths;
use crate::core::types::{ApplyReport, PatchRecord, UnitOutcome, UnitPatch, UnitState, UpdateId};
use crate::error::PatchError;
use crate::global_actions::GlobalActionRunner;
use crate::io::baseline::BaselineSource;
use crate::io::config_store::ConfigStore;
use crate::io::installer::ModuleInstaller;
use crate::io::patch_store::PatchStore;

/// Applies patch records through explicitly supplied collaborators.
pub struct ConfigApplier<S, I, B> {
    store: S,
    installer: I,
    baseline: B,
}

impl<S: ConfigStore, I: ModuleInstaller, B: BaselineSource> ConfigApplier<S, I, B> {
    pub fn new(store: S, installer: I, baseline: B) -> Self {
        Self {
            store,
            installer,
            baseline,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load the patch file for `id` and apply it.
    #[instrument(skip_all, fields(update = %id))]
    pub fn apply_patch(
        &mut self,
        patches: &PatchStore,
        id: &UpdateId,
    ) -> Result<ApplyReport, PatchError> {
        let record = patches.load(id)?;
        Ok(self.apply_record(id, &record))
    }

    /// Apply an already decoded record.
    pub fn apply_record(&mut self, id: &UpdateId, record: &PatchRecord) -> ApplyReport {
        let mut warnings = Vec::new();

        if let Some(actions) = &record.global_actions {
            debug!(
                install = actions.install_modules.len(),
                import = actions.import_configs.len(),
                "running global actions"
            );
            let mut runner = GlobalActionRunner {
                store: &mut self.store,
                installer: &mut self.installer,
                baseline: &self.baseline,
            };
            warnings.extend(runner.run(actions));
        }

        let mut units = Vec::with_capacity(record.units.len());
        for unit in &record.units {
            let state = self.apply_unit(unit, &mut warnings);
            units.push(UnitOutcome {
                unit: unit.name.clone(),
                state,
            });
        }

        let report = ApplyReport::new(id.clone(), warnings, units);
        info!(ok = report.ok, warnings = report.warnings.len(), "patch applied");
        report
    }

    fn apply_unit(&mut self, unit: &UnitPatch, warnings: &mut Vec<String>) -> UnitState {
        let name = unit.name.as_str();
        let mut live = match self.store.load(name) {
            Ok(Some(live)) => live,
            Ok(None) => {
                warn!(unit = name, "configuration missing, skipped");
                warnings.push(format!(
                    "Unable to apply changes to {name}: configuration does not exist"
                ));
                return UnitState::MissingSkipped;
            }
            Err(err) => {
                warn!(unit = name, error = %format!("{err:#}"), "configuration unreadable");
                warnings.push(format!("Unable to read configuration {name}: {err:#}"));
                return UnitState::StoreFailed;
            }
        };

        match check_unit(&unit.expected, &unit.delta, &live) {
            UnitCheck::AlreadyCurrent => {
                debug!(unit = name, "already current");
                return UnitState::AlreadyCurrent;
            }
            UnitCheck::Conflict(paths) => {
                let paths = join_paths(&paths);
                warn!(unit = name, paths = %paths, "expected configuration mismatch, skipped");
                warnings.push(format!(
                    "Unable to apply changes to {name}: expected configuration does not match at {paths}"
                ));
                return UnitState::ConflictSkipped;
            }
            UnitCheck::Applicable => {}
        }

        apply_delta(&mut live, &unit.delta);
        if let Err(err) = self.store.save(name, &live) {
            warn!(unit = name, error = %format!("{err:#}"), "configuration write failed");
            warnings.push(format!("Unable to save configuration {name}: {err:#}"));
            return UnitState::StoreFailed;
        }
        info!(unit = name, "applied");
        UnitState::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Delta, GlobalActions};
    use crate::io::baseline::MemoryBaselines;
    use crate::io::config_store::MemoryStore;
    use crate::test_support::{FakeInstaller, delta, tree};
    use crate::tree::Map;
    use anyhow::anyhow;
    use serde_json::json;

    fn id() -> UpdateId {
        UpdateId::new("node", "node_update_1").expect("id")
    }

    fn applier(store: MemoryStore) -> ConfigApplier<MemoryStore, FakeInstaller, MemoryBaselines> {
        ConfigApplier::new(store, FakeInstaller::new(&["help"]), MemoryBaselines::new())
    }

    fn unit(name: &str, expected: serde_json::Value, delta: Delta) -> UnitPatch {
        UnitPatch {
            name: name.to_string(),
            expected: tree(expected),
            delta,
        }
    }

    #[test]
    fn conflict_skips_with_one_warning() {
        let live = tree(json!({"status": true, "type": "text"}));
        let mut applier = applier(MemoryStore::new().with("field.storage.node.body", live.clone()));
        let record = PatchRecord {
            global_actions: None,
            units: vec![unit(
                "field.storage.node.body",
                json!({"status": false}),
                delta(json!({}), json!({"type": "text_with_summary"}), json!({})),
            )],
        };

        let report = applier.apply_record(&id(), &record);
        assert!(!report.ok);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("status"));
        assert_eq!(
            report.state_of("field.storage.node.body"),
            Some(UnitState::ConflictSkipped)
        );
        assert_eq!(applier.store().get("field.storage.node.body"), Some(&live));
    }

    #[test]
    fn missing_unit_does_not_stop_others() {
        let mut applier = applier(MemoryStore::new().with("system.site", tree(json!({"name": "Old"}))));
        let record = PatchRecord {
            global_actions: None,
            units: vec![
                unit("absent.unit", json!({}), delta(json!({"a": 1}), json!({}), json!({}))),
                unit(
                    "system.site",
                    json!({"name": "Old"}),
                    delta(json!({}), json!({"name": "New"}), json!({})),
                ),
            ],
        };

        let report = applier.apply_record(&id(), &record);
        assert!(!report.ok);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.state_of("absent.unit"), Some(UnitState::MissingSkipped));
        assert_eq!(report.state_of("system.site"), Some(UnitState::Applied));
        assert_eq!(
            applier.store().get("system.site"),
            Some(&tree(json!({"name": "New"})))
        );
    }

    #[test]
    fn second_apply_is_already_current() {
        let live = tree(json!({
            "id": "node.body",
            "lost_config": "text",
            "settings": {"max_length": 123},
            "status": false,
            "type": "text"
        }));
        let mut applier = applier(MemoryStore::new().with("field.storage.node.body", live));
        let record = PatchRecord {
            global_actions: None,
            units: vec![unit(
                "field.storage.node.body",
                json!({
                    "lost_config": "text",
                    "settings": {"max_length": 123},
                    "status": false,
                    "type": "text"
                }),
                delta(
                    json!({"cardinality": 1}),
                    json!({"settings": {}, "status": true, "type": "text_with_summary"}),
                    json!({"lost_config": "text", "settings": {"max_length": 123}}),
                ),
            )],
        };

        let first = applier.apply_record(&id(), &record);
        assert!(first.ok);
        let after_first = applier.store().clone();

        let second = applier.apply_record(&id(), &record);
        assert!(second.ok);
        assert_eq!(
            second.state_of("field.storage.node.body"),
            Some(UnitState::AlreadyCurrent)
        );
        assert_eq!(applier.store(), &after_first);
        assert_eq!(
            applier.store().get("field.storage.node.body"),
            Some(&tree(json!({
                "id": "node.body",
                "cardinality": 1,
                "settings": {},
                "status": true,
                "type": "text_with_summary"
            })))
        );
    }

    #[test]
    fn global_actions_run_before_units() {
        // The unit only exists once the module install has created it.
        let mut applier = applier(MemoryStore::new());
        let record = PatchRecord {
            global_actions: Some(GlobalActions {
                install_modules: vec!["help".to_string()],
                import_configs: Vec::new(),
            }),
            units: vec![unit(
                "core.extension",
                json!({}),
                delta(json!({"profile": "standard"}), json!({}), json!({})),
            )],
        };
        let report = applier.apply_record(&id(), &record);
        assert!(report.ok, "{:?}", report.warnings);
        assert_eq!(report.state_of("core.extension"), Some(UnitState::Applied));
        assert_eq!(
            applier.store().get("core.extension"),
            Some(&tree(json!({"module": {"help": 0}, "profile": "standard"})))
        );
    }

    #[test]
    fn empty_record_is_ok() {
        let report = applier(MemoryStore::new()).apply_record(&id(), &PatchRecord::default());
        assert!(report.ok);
        assert!(report.units.is_empty());
    }

    struct FailingStore(MemoryStore);

    impl ConfigStore for FailingStore {
        fn load(&self, name: &str) -> anyhow::Result<Option<Map>> {
            self.0.load(name)
        }

        fn save(&mut self, name: &str, _data: &Map) -> anyhow::Result<()> {
            Err(anyhow!("disk full writing {name}"))
        }

        fn list(&self) -> anyhow::Result<Vec<String>> {
            self.0.list()
        }
    }

    #[test]
    fn write_failure_is_a_warning() {
        let store = FailingStore(MemoryStore::new().with("system.site", tree(json!({"name": "Old"}))));
        let mut applier = ConfigApplier::new(store, FakeInstaller::new(&[]), MemoryBaselines::new());
        let record = PatchRecord {
            global_actions: None,
            units: vec![unit(
                "system.site",
                json!({}),
                delta(json!({}), json!({"name": "New"}), json!({})),
            )],
        };
        let report = applier.apply_record(&id(), &record);
        assert!(!report.ok);
        assert_eq!(report.state_of("system.site"), Some(UnitState::StoreFailed));
        assert!(report.warnings[0].contains("disk full"));
    }
}
