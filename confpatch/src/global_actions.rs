//! Pre-steps of a patch record: module installs and config imports.
//!
//! Every failure is caught per item and returned as a warning; one failing
//! module or config never blocks the rest.

use tracing::{info, warn};

use crate::core::types::GlobalActions;
use crate::io::baseline::BaselineSource;
use crate::io::config_store::ConfigStore;
use crate::io::installer::{InstallStatus, ModuleInstaller};

pub struct GlobalActionRunner<'a> {
    pub store: &'a mut dyn ConfigStore,
    pub installer: &'a mut dyn ModuleInstaller,
    pub baseline: &'a dyn BaselineSource,
}

impl GlobalActionRunner<'_> {
    /// Install modules, then import configs. Returns warnings in order.
    pub fn run(&mut self, actions: &GlobalActions) -> Vec<String> {
        let mut warnings = self.install_modules(&actions.install_modules);
        warnings.extend(self.import_configs(&actions.import_configs));
        warnings
    }

    pub fn install_modules(&mut self, modules: &[String]) -> Vec<String> {
        let mut warnings = Vec::new();
        for module in modules {
            match self.installer.install(module, &mut *self.store) {
                Ok(InstallStatus::Installed) => info!(module = %module, "installed module"),
                Ok(InstallStatus::AlreadyInstalled) => {}
                Err(err) => {
                    warn!(module = %module, error = %err, "module install failed");
                    warnings.push(format!("Unable to install module {module}: {err}"));
                }
            }
        }
        warnings
    }

    /// Create units from their baseline definitions. Existing units are left
    /// alone.
    pub fn import_configs(&mut self, names: &[String]) -> Vec<String> {
        let mut warnings = Vec::new();
        for name in names {
            if let Err(message) = self.import_config(name) {
                warn!(unit = %name, "{message}");
                warnings.push(message);
            }
        }
        warnings
    }

    fn import_config(&mut self, name: &str) -> Result<(), String> {
        let exists = self
            .store
            .exists(name)
            .map_err(|err| format!("Unable to import config {name}: {err:#}"))?;
        if exists {
            return Err(format!("Config {name} already exists, import skipped"));
        }
        let data = match self.baseline.read(name) {
            Ok(Some(data)) => data,
            Ok(None) => return Err(format!("Config {name} not found in any module")),
            Err(err) => return Err(format!("Unable to read config {name}: {err:#}")),
        };
        self.store
            .save(name, &data)
            .map_err(|err| format!("Unable to import config {name}: {err:#}"))?;
        info!(unit = %name, "imported config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::baseline::MemoryBaselines;
    use crate::io::config_store::MemoryStore;
    use crate::test_support::{FakeInstaller, tree};
    use serde_json::json;

    #[test]
    fn failed_install_does_not_block_others() {
        let mut store = MemoryStore::new();
        let mut installer = FakeInstaller::new(&["help", "tour"]);
        let baseline = MemoryBaselines::new();
        let mut runner = GlobalActionRunner {
            store: &mut store,
            installer: &mut installer,
            baseline: &baseline,
        };
        let warnings = runner.install_modules(&[
            "help".to_string(),
            "ghost".to_string(),
            "tour".to_string(),
            "help".to_string(),
        ]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ghost"));
        assert_eq!(installer.installed(), vec!["help".to_string(), "tour".to_string()]);
    }

    #[test]
    fn import_creates_only_missing_units() {
        let mut store = MemoryStore::new().with("system.site", tree(json!({"name": "Live"})));
        let mut installer = FakeInstaller::new(&[]);
        let baseline = MemoryBaselines::new()
            .with("system", "system.site", tree(json!({"name": "Default"})))
            .with("tour", "tour.tour.intro", tree(json!({"label": "Intro"})));
        let warnings = GlobalActionRunner {
            store: &mut store,
            installer: &mut installer,
            baseline: &baseline,
        }
        .import_configs(&[
            "system.site".to_string(),
            "tour.tour.intro".to_string(),
            "missing.unit".to_string(),
        ]);

        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("system.site already exists"));
        assert!(warnings[1].contains("missing.unit not found"));
        assert_eq!(store.get("system.site"), Some(&tree(json!({"name": "Live"}))));
        assert_eq!(
            store.get("tour.tour.intro"),
            Some(&tree(json!({"label": "Intro"})))
        );
    }

    #[test]
    fn installs_run_before_imports() {
        let mut store = MemoryStore::new();
        let mut installer = FakeInstaller::new(&["tour"]);
        let baseline = MemoryBaselines::new();
        let actions = GlobalActions {
            install_modules: vec!["tour".to_string()],
            import_configs: vec!["core.extension".to_string()],
        };
        let warnings = GlobalActionRunner {
            store: &mut store,
            installer: &mut installer,
            baseline: &baseline,
        }
        .run(&actions);
        // The fake installer records modules in `core.extension`, so the
        // import afterwards finds it present.
        assert_eq!(warnings, vec!["Config core.extension already exists, import skipped"]);
    }
}
