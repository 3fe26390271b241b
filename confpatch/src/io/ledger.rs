//! Progress ledger recording the outcome of every apply.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::files::write_atomic;
use crate::core::types::UpdateId;

/// Sink for apply outcomes.
pub trait ProgressLedger {
    fn record(&mut self, id: &UpdateId, ok: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub successful: bool,
}

/// JSON object keyed by [`UpdateId::ledger_key`] (`state/updates.json`).
#[derive(Debug, Clone)]
pub struct JsonLedger {
    path: PathBuf,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All recorded entries; a missing file is an empty ledger.
    pub fn entries(&self) -> Result<BTreeMap<String, LedgerEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read ledger {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse ledger {}", self.path.display()))
    }

    pub fn get(&self, id: &UpdateId) -> Result<Option<LedgerEntry>> {
        Ok(self.entries()?.remove(&id.ledger_key()))
    }
}

impl ProgressLedger for JsonLedger {
    fn record(&mut self, id: &UpdateId, ok: bool) -> Result<()> {
        debug!(path = %self.path.display(), update = %id, ok, "recording update");
        let mut entries = self.entries()?;
        entries.insert(id.ledger_key(), LedgerEntry { successful: ok });
        let mut buf = serde_json::to_string_pretty(&entries)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}
