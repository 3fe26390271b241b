//! Small filesystem helpers shared by the stores.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::tree::{Map, Value};

/// Read a YAML file holding one configuration tree. An empty document is an
/// empty map.
pub fn read_yaml_map(path: &Path) -> Result<Map> {
    debug!(path = %path.display(), "reading yaml tree");
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value =
        serde_yaml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    match value {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(anyhow!("{} does not hold a mapping", path.display())),
    }
}

/// Atomically write a configuration tree as YAML.
pub fn write_yaml_atomic(path: &Path, data: &Map) -> Result<()> {
    debug!(path = %path.display(), "writing yaml tree");
    let buf = serde_yaml::to_string(data)
        .with_context(|| format!("serialize {}", path.display()))?;
    write_atomic(path, &buf)
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
