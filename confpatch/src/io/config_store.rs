//! Live configuration storage.
//!
//! A store maps fully qualified unit names (e.g. `field.storage.node.body`) to
//! configuration trees. The engine only reads and writes whole units.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::files::{read_yaml_map, write_yaml_atomic};
use crate::tree::Map;

/// Key-value access to live configuration units.
pub trait ConfigStore {
    /// Load a unit; `None` if no unit of that name exists.
    fn load(&self, name: &str) -> Result<Option<Map>>;

    /// Create or replace a unit.
    fn save(&mut self, name: &str, data: &Map) -> Result<()>;

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.load(name)?.is_some())
    }

    /// Names of all units, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for &mut T {
    fn load(&self, name: &str) -> Result<Option<Map>> {
        (**self).load(name)
    }

    fn save(&mut self, name: &str, data: &Map) -> Result<()> {
        (**self).save(name, data)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }

    fn list(&self) -> Result<Vec<String>> {
        (**self).list()
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    units: BTreeMap<String, Map>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, data: Map) -> Self {
        self.units.insert(name.to_string(), data);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Map> {
        self.units.get(name)
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<Map>> {
        Ok(self.units.get(name).cloned())
    }

    fn save(&mut self, name: &str, data: &Map) -> Result<()> {
        self.units.insert(name.to_string(), data.clone());
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.units.contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.units.keys().cloned().collect())
    }
}

/// One YAML file per unit: `<dir>/<name>.yml`.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unit_path(&self, name: &str) -> Result<PathBuf> {
        validate_unit_name(name)?;
        Ok(self.dir.join(format!("{name}.yml")))
    }
}

impl ConfigStore for DirStore {
    fn load(&self, name: &str) -> Result<Option<Map>> {
        let path = self.unit_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        read_yaml_map(&path).map(Some)
    }

    fn save(&mut self, name: &str, data: &Map) -> Result<()> {
        let path = self.unit_path(name)?;
        debug!(unit = name, path = %path.display(), "saving unit");
        write_yaml_atomic(&path, data)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.unit_path(name)?.is_file())
    }

    fn list(&self) -> Result<Vec<String>> {
        list_units(&self.dir)
    }
}

/// Unit names of the `*.yml` files directly inside `dir`, sorted. A missing
/// directory has no units.
pub fn list_units(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read directory {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "yml") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Unit names become file names; reject anything that could leave the
/// directory.
pub fn validate_unit_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(anyhow!("invalid configuration name `{name}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tree;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new().with("system.site", tree(json!({"name": "Site"})));
        assert!(store.exists("system.site").expect("exists"));
        assert!(!store.exists("missing").expect("exists"));
        store
            .save("node.type.page", &tree(json!({"type": "page"})))
            .expect("save");
        assert_eq!(
            store.list().expect("list"),
            vec!["node.type.page".to_string(), "system.site".to_string()]
        );
    }

    #[test]
    fn dir_store_persists_yaml_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = DirStore::new(temp.path().join("active"));
        assert_eq!(store.load("system.site").expect("load"), None);
        assert!(store.list().expect("list").is_empty());

        let data = tree(json!({"name": "Site", "page": {"403": "", "front": "/node"}}));
        store.save("system.site", &data).expect("save");
        assert!(temp.path().join("active/system.site.yml").is_file());
        assert_eq!(store.load("system.site").expect("load"), Some(data));
        assert_eq!(store.list().expect("list"), vec!["system.site".to_string()]);
    }

    #[test]
    fn path_like_names_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = DirStore::new(temp.path());
        for name in ["../escape", "a/b", "", ".hidden", "trailing."] {
            assert!(store.load(name).is_err(), "{name:?}");
            assert!(store.save(name, &Map::new()).is_err(), "{name:?}");
        }
    }
}
