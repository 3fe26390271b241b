//! Module-shipped baseline configuration.
//!
//! Every module may ship configuration definitions under
//! `config/install/<full_name>.yml` (imported on install) and
//! `config/optional/<full_name>.yml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use super::config_store::{list_units, validate_unit_name};
use super::files::{read_yaml_map, write_yaml_atomic};
use crate::tree::Map;

pub const INSTALL_DIR: &str = "install";
pub const OPTIONAL_DIR: &str = "optional";

/// Read access to module baselines, plus export of live data back into them.
pub trait BaselineSource {
    /// Unit names shipped by `module`, sorted.
    fn units(&self, module: &str) -> Result<Vec<String>>;

    /// Baseline definition of a unit from whichever module ships it.
    fn read(&self, full_name: &str) -> Result<Option<Map>>;

    /// Overwrite an existing baseline definition. Returns `false` when no
    /// module ships `full_name`; nothing is created.
    fn write(&mut self, full_name: &str, data: &Map) -> Result<bool>;
}

/// Baselines read from `<modules_dir>/<module>/config/{install,optional}`.
#[derive(Debug, Clone)]
pub struct ModuleBaselines {
    modules_dir: PathBuf,
}

impl ModuleBaselines {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    /// Module names present on disk, sorted.
    pub fn modules(&self) -> Result<Vec<String>> {
        if !self.modules_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.modules_dir)
            .with_context(|| format!("read directory {}", self.modules_dir.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read directory {}", self.modules_dir.display()))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn config_dir(&self, module: &str, kind: &str) -> PathBuf {
        self.modules_dir.join(module).join("config").join(kind)
    }

    /// First existing definition file for `full_name`: every module's install
    /// directory, then every module's optional directory.
    fn locate(&self, full_name: &str) -> Result<Option<PathBuf>> {
        validate_unit_name(full_name)?;
        let modules = self.modules()?;
        for kind in [INSTALL_DIR, OPTIONAL_DIR] {
            for module in &modules {
                let path = self
                    .config_dir(module, kind)
                    .join(format!("{full_name}.yml"));
                if path.is_file() {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }
}

impl BaselineSource for ModuleBaselines {
    fn units(&self, module: &str) -> Result<Vec<String>> {
        let mut names = list_units(&self.config_dir(module, INSTALL_DIR))?;
        names.extend(list_units(&self.config_dir(module, OPTIONAL_DIR))?);
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn read(&self, full_name: &str) -> Result<Option<Map>> {
        match self.locate(full_name)? {
            Some(path) => read_yaml_map(&path).map(Some),
            None => Ok(None),
        }
    }

    fn write(&mut self, full_name: &str, data: &Map) -> Result<bool> {
        let Some(path) = self.locate(full_name)? else {
            return Ok(false);
        };
        debug!(unit = full_name, path = %path.display(), "exporting baseline");
        write_yaml_atomic(&path, data)?;
        Ok(true)
    }
}

/// In-memory baselines keyed by module, for callers that already hold the
/// definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryBaselines {
    modules: BTreeMap<String, BTreeMap<String, Map>>,
}

impl MemoryBaselines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: &str, full_name: &str, data: Map) -> Self {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(full_name.to_string(), data);
        self
    }

    pub fn get(&self, full_name: &str) -> Option<&Map> {
        self.modules.values().find_map(|units| units.get(full_name))
    }
}

impl BaselineSource for MemoryBaselines {
    fn units(&self, module: &str) -> Result<Vec<String>> {
        Ok(self
            .modules
            .get(module)
            .map(|units| units.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read(&self, full_name: &str) -> Result<Option<Map>> {
        Ok(self.get(full_name).cloned())
    }

    fn write(&mut self, full_name: &str, data: &Map) -> Result<bool> {
        for units in self.modules.values_mut() {
            if let Some(existing) = units.get_mut(full_name) {
                *existing = data.clone();
                return Ok(true);
            }
        }
        Ok(false)
    }
}
