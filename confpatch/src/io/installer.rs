//! Module installation for `install_modules` global actions.
//!
//! Installed modules are recorded in the live `core.extension` unit under
//! `module.<name>`. Installing a module first installs its dependencies
//! (declared in `<module>/module.toml`), then imports every `config/install`
//! definition that does not already exist live.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use super::baseline::INSTALL_DIR;
use super::config_store::{ConfigStore, list_units};
use super::files::read_yaml_map;
use crate::tree::{Map, Value};

/// Live unit listing installed modules.
pub const EXTENSION_UNIT: &str = "core.extension";

/// Why a module could not be installed.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("module `{0}` does not exist")]
    UnknownModule(String),

    #[error("module `{module}` requires missing module `{dependency}`")]
    MissingDependency { module: String, dependency: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
}

/// Capability to install a module into a live store.
pub trait ModuleInstaller {
    fn install(
        &mut self,
        module: &str,
        store: &mut dyn ConfigStore,
    ) -> Result<InstallStatus, InstallError>;
}

/// Names recorded in the live `core.extension` unit.
pub fn installed_modules(store: &dyn ConfigStore) -> anyhow::Result<BTreeSet<String>> {
    let Some(extension) = store.load(EXTENSION_UNIT)? else {
        return Ok(BTreeSet::new());
    };
    Ok(extension
        .get("module")
        .and_then(Value::as_map)
        .map(|modules| modules.keys().cloned().collect())
        .unwrap_or_default())
}

/// `<module>/module.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModuleManifest {
    pub dependencies: Vec<String>,
}

/// Installs modules found under a modules directory.
#[derive(Debug, Clone)]
pub struct SiteInstaller {
    modules_dir: PathBuf,
}

impl SiteInstaller {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    fn module_exists(&self, module: &str) -> bool {
        !module.is_empty() && !module.contains(['/', '\\', '.']) && self.modules_dir.join(module).is_dir()
    }

    fn manifest(&self, module: &str) -> anyhow::Result<ModuleManifest> {
        let path = self.modules_dir.join(module).join("module.toml");
        if !path.exists() {
            return Ok(ModuleManifest::default());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    /// Modules to enable, dependencies first. Modules already installed or
    /// already on the stack count as satisfied.
    fn resolve(
        &self,
        module: &str,
        installed: &BTreeSet<String>,
        visiting: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), InstallError> {
        if installed.contains(module) || !visiting.insert(module.to_string()) {
            return Ok(());
        }
        for dependency in self.manifest(module)?.dependencies {
            if installed.contains(&dependency) || visiting.contains(&dependency) {
                continue;
            }
            if !self.module_exists(&dependency) {
                return Err(InstallError::MissingDependency {
                    module: module.to_string(),
                    dependency,
                });
            }
            self.resolve(&dependency, installed, visiting, order)?;
        }
        order.push(module.to_string());
        Ok(())
    }

    /// Import the install config, then record the module. A failed import
    /// leaves the module unrecorded so a later install retries it.
    fn enable(&self, module: &str, store: &mut dyn ConfigStore) -> anyhow::Result<()> {
        let install_dir = self.modules_dir.join(module).join("config").join(INSTALL_DIR);
        for name in list_units(&install_dir)? {
            if store.exists(&name)? {
                debug!(module, unit = %name, "install config already present");
                continue;
            }
            let data = read_yaml_map(&install_dir.join(format!("{name}.yml")))?;
            store.save(&name, &data)?;
            debug!(module, unit = %name, "imported install config");
        }

        let mut extension = store.load(EXTENSION_UNIT)?.unwrap_or_default();
        let modules = extension
            .entry("module".to_string())
            .or_insert_with(|| Value::Map(Map::new()));
        if !matches!(modules, Value::Map(_)) {
            *modules = Value::Map(Map::new());
        }
        if let Value::Map(modules) = modules {
            modules.insert(module.to_string(), Value::Int(0));
        }
        store.save(EXTENSION_UNIT, &extension)?;
        info!(module, "module installed");
        Ok(())
    }
}

impl ModuleInstaller for SiteInstaller {
    fn install(
        &mut self,
        module: &str,
        store: &mut dyn ConfigStore,
    ) -> Result<InstallStatus, InstallError> {
        let installed = installed_modules(store)?;
        if installed.contains(module) {
            return Ok(InstallStatus::AlreadyInstalled);
        }
        if !self.module_exists(module) {
            return Err(InstallError::UnknownModule(module.to_string()));
        }

        let mut order = Vec::new();
        self.resolve(module, &installed, &mut BTreeSet::new(), &mut order)?;
        for name in &order {
            self.enable(name, store)?;
        }
        Ok(InstallStatus::Installed)
    }
}
