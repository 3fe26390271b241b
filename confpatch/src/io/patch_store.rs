//! Patch file location and persistence.
//!
//! Patch files live at `<modules_dir>/<module>/config/update/<update>.<ext>`.
//! They are append-only: each generated block is added to the end of the file.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::codec::{self, PatchFormat};
use crate::core::types::{PatchRecord, UpdateId};
use crate::error::PatchError;

/// Patch files of every module under one modules directory.
#[derive(Debug, Clone)]
pub struct PatchStore {
    modules_dir: PathBuf,
    format: PatchFormat,
}

impl PatchStore {
    pub fn new(modules_dir: impl Into<PathBuf>, format: PatchFormat) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            format,
        }
    }

    pub fn format(&self) -> PatchFormat {
        self.format
    }

    /// Location of the patch file for `id`. With `create_dirs` the update
    /// directory is created.
    pub fn resolve_path(&self, id: &UpdateId, create_dirs: bool) -> Result<PathBuf, PatchError> {
        let dir = self
            .modules_dir
            .join(id.module())
            .join("config")
            .join("update");
        if create_dirs {
            fs::create_dir_all(&dir).map_err(|source| PatchError::Io {
                action: "create directory",
                path: dir.clone(),
                source,
            })?;
        }
        Ok(dir.join(format!("{}.{}", id.update(), self.format.extension())))
    }

    /// Append one encoded block to `path`, creating the file if needed.
    pub fn append(&self, path: &Path, block: &str) -> Result<(), PatchError> {
        debug!(path = %path.display(), bytes = block.len(), "appending patch block");
        let io_err = |source| PatchError::Io {
            action: "append to",
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(block.as_bytes()).map_err(io_err)?;
        Ok(())
    }

    /// Read and decode the patch file for `id`.
    pub fn load(&self, id: &UpdateId) -> Result<PatchRecord, PatchError> {
        let path = self.resolve_path(id, false)?;
        debug!(path = %path.display(), "loading patch");
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PatchError::NotFound { path });
            }
            Err(source) => {
                return Err(PatchError::Io {
                    action: "read",
                    path,
                    source,
                });
            }
        };
        codec::decode(self.format, &text).map_err(|err| err.in_file(&path))
    }
}
