//! Canonical paths of a site root.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::config::{AppConfig, load_config};

/// Name of the optional configuration file at the site root.
pub const CONFIG_FILE: &str = "confpatch.toml";

/// All canonical paths within a site root.
#[derive(Debug, Clone)]
pub struct SitePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub modules_dir: PathBuf,
    pub active_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl SitePaths {
    pub fn new(root: impl Into<PathBuf>, cfg: &AppConfig) -> Self {
        let root = root.into();
        Self {
            config_path: config_path(&root),
            modules_dir: root.join(&cfg.modules_dir),
            active_dir: root.join(&cfg.active_dir),
            ledger_path: root.join(&cfg.ledger_path),
            root,
        }
    }

    /// Load `confpatch.toml` (or defaults) and resolve paths against `root`.
    pub fn load(root: impl Into<PathBuf>) -> Result<(Self, AppConfig)> {
        let root = root.into();
        let cfg = load_config(&config_path(&root))?;
        Ok((Self::new(root, &cfg), cfg))
    }

    /// Directory of one module.
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.modules_dir.join(module)
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}
