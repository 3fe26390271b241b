//! Site configuration stored in `confpatch.toml` at the site root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::files::write_atomic;
use crate::core::codec::PatchFormat;

/// Site configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults of the
/// standard site layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Patch codec; also decides the patch file extension.
    pub format: PatchFormat,

    /// Directory holding one subdirectory per module, relative to the root.
    pub modules_dir: PathBuf,

    /// Live configuration store, relative to the root.
    pub active_dir: PathBuf,

    /// Progress ledger file, relative to the root.
    pub ledger_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            format: PatchFormat::Yaml,
            modules_dir: PathBuf::from("modules"),
            active_dir: PathBuf::from("active"),
            ledger_path: PathBuf::from("state/updates.json"),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        check_relative("modules_dir", &self.modules_dir)?;
        check_relative("active_dir", &self.active_dir)?;
        check_relative("ledger_path", &self.ledger_path)?;
        Ok(())
    }
}

fn check_relative(field: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(anyhow!("{field} must not be empty"));
    }
    if !path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return Err(anyhow!(
            "{field} must be a relative path inside the site root, got {}",
            path.display()
        ));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("confpatch.toml");
        let cfg = AppConfig {
            format: PatchFormat::Json,
            active_dir: PathBuf::from("sync/active"),
            ..AppConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("confpatch.toml");
        fs::write(&path, "format = \"json\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.format, PatchFormat::Json);
        assert_eq!(cfg.modules_dir, PathBuf::from("modules"));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("confpatch.toml");
        fs::write(&path, "active_dir = \"../elsewhere\"\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("active_dir must be a relative path"));

        fs::write(&path, "format = \"xml\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
