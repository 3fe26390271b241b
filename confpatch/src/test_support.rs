//! Test-only helpers for building trees, fake collaborators and site
//! directories.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::path::KeyPath;
use crate::core::types::Delta;
use crate::io::config_store::{ConfigStore, DirStore};
use crate::io::files::write_yaml_atomic;
use crate::io::installer::{EXTENSION_UNIT, InstallError, InstallStatus, ModuleInstaller};
use crate::tree::{Map, Value};

/// Build a configuration tree from a JSON object literal.
pub fn tree(value: serde_json::Value) -> Map {
    match serde_json::from_value::<Value>(value).expect("tree literal") {
        Value::Map(map) => map,
        other => panic!("tree literal must be an object, got {other:?}"),
    }
}

pub fn path(segments: &[&str]) -> KeyPath {
    segments.iter().copied().collect()
}

/// Build a delta; `deleted` is given in nested form, as in patch files.
pub fn delta(
    added: serde_json::Value,
    changed: serde_json::Value,
    deleted: serde_json::Value,
) -> Delta {
    Delta {
        added: tree(added),
        changed: tree(changed),
        deleted: Delta::deleted_from_tree(&tree(deleted)),
    }
}

/// Installer that knows a fixed set of modules and records each install in
/// `core.extension`, without dependencies or config import.
#[derive(Debug, Clone, Default)]
pub struct FakeInstaller {
    known: BTreeSet<String>,
    installed: Vec<String>,
}

impl FakeInstaller {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: known.iter().map(|name| name.to_string()).collect(),
            installed: Vec::new(),
        }
    }

    /// Modules installed so far, in install order.
    pub fn installed(&self) -> Vec<String> {
        self.installed.clone()
    }
}

impl ModuleInstaller for FakeInstaller {
    fn install(
        &mut self,
        module: &str,
        store: &mut dyn ConfigStore,
    ) -> Result<InstallStatus, InstallError> {
        if !self.known.contains(module) {
            return Err(InstallError::UnknownModule(module.to_string()));
        }
        if self.installed.iter().any(|name| name == module) {
            return Ok(InstallStatus::AlreadyInstalled);
        }
        let mut extension = store.load(EXTENSION_UNIT)?.unwrap_or_default();
        let mut entry = Map::new();
        entry.insert(module.to_string(), Value::Int(0));
        let mut update = Map::new();
        update.insert("module".to_string(), Value::Map(entry));
        crate::tree::merge_deep(&mut extension, &update);
        store.save(EXTENSION_UNIT, &extension)?;
        self.installed.push(module.to_string());
        Ok(InstallStatus::Installed)
    }
}

/// Temporary site root with the default layout.
pub struct SiteFixture {
    temp: TempDir,
}

impl Default for SiteFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteFixture {
    pub fn new() -> Self {
        Self {
            temp: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root().join("modules")
    }

    pub fn active_dir(&self) -> PathBuf {
        self.root().join("active")
    }

    /// Create a module directory with a `module.toml` listing `dependencies`.
    pub fn write_module(&self, module: &str, dependencies: &[&str]) {
        let dir = self.modules_dir().join(module);
        fs::create_dir_all(&dir).expect("create module dir");
        let list = dependencies
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(dir.join("module.toml"), format!("dependencies = [{list}]\n"))
            .expect("write module.toml");
    }

    /// Write `<module>/config/<kind>/<name>.yml`.
    pub fn write_baseline(&self, module: &str, kind: &str, name: &str, data: serde_json::Value) {
        let path = self
            .modules_dir()
            .join(module)
            .join("config")
            .join(kind)
            .join(format!("{name}.yml"));
        write_yaml_atomic(&path, &tree(data)).expect("write baseline");
    }

    pub fn write_active(&self, name: &str, data: serde_json::Value) {
        DirStore::new(self.active_dir())
            .save(name, &tree(data))
            .expect("write active unit");
    }

    pub fn read_active(&self, name: &str) -> Option<Map> {
        DirStore::new(self.active_dir())
            .load(name)
            .expect("read active unit")
    }

    pub fn read_baseline(&self, module: &str, kind: &str, name: &str) -> Map {
        let path = self
            .modules_dir()
            .join(module)
            .join("config")
            .join(kind)
            .join(format!("{name}.yml"));
        crate::io::files::read_yaml_map(&path).expect("read baseline")
    }

    /// Path of a YAML patch file (not created).
    pub fn patch_path(&self, module: &str, update: &str) -> PathBuf {
        self.modules_dir()
            .join(module)
            .join("config")
            .join("update")
            .join(format!("{update}.yml"))
    }

    pub fn write_patch(&self, module: &str, update: &str, text: &str) {
        let path = self.patch_path(module, update);
        fs::create_dir_all(path.parent().expect("patch dir")).expect("create patch dir");
        fs::write(&path, text).expect("write patch");
    }
}
