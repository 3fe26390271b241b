//! Patch generation: diff module baselines against live configuration.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::codec::{self, PatchFormat};
use crate::core::differ::diff;
use crate::core::types::{GlobalActions, PatchRecord, UnitPatch, UpdateId};
use crate::error::PatchError;
use crate::io::baseline::BaselineSource;
use crate::io::config_store::ConfigStore;
use crate::io::patch_store::PatchStore;
use crate::tree::Map;

/// Which side of the diff is the desired state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Module baselines are desired; the patch brings live config to them.
    /// Baseline files are left untouched.
    #[default]
    ActiveToBaseline,
    /// Live config is desired; the patch brings a site still on the shipped
    /// baselines to it. Every diffed baseline is listed for export with the
    /// live data.
    BaselineToActive,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Modules whose baseline units are scanned, in order.
    pub modules: Vec<String>,
    pub direction: Direction,
    /// Pre-steps to put at the top of the patch.
    pub global_actions: Option<GlobalActions>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedPatch {
    /// True iff at least one unit block was produced.
    pub changes_found: bool,
    pub global_actions: Option<GlobalActions>,
    pub units: Vec<UnitPatch>,
    /// Encoded blocks, global actions first.
    pub text: String,
    /// Baseline units to overwrite with live data once the patch is written.
    /// Empty unless the direction is `BaselineToActive`.
    pub exports: Vec<(String, Map)>,
}

/// Diff every baseline unit of the requested modules that also exists live.
///
/// Reads only; see [`export_baselines`] for the export step.
#[instrument(skip_all, fields(modules = request.modules.len(), direction = ?request.direction))]
pub fn generate_patch<S: ConfigStore, B: BaselineSource>(
    store: &S,
    baselines: &B,
    format: PatchFormat,
    request: &GenerateRequest,
) -> Result<GeneratedPatch> {
    let mut seen = BTreeSet::new();
    let mut units = Vec::new();
    let mut exports = Vec::new();

    for module in &request.modules {
        for name in baselines.units(module)? {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(live) = store.load(&name)? else {
                debug!(module = %module, unit = %name, "not in live configuration, skipped");
                continue;
            };
            let Some(baseline) = baselines.read(&name)? else {
                continue;
            };

            let result = match request.direction {
                Direction::ActiveToBaseline => diff(&baseline, &live),
                Direction::BaselineToActive => diff(&live, &baseline),
            };
            if result.is_empty() {
                continue;
            }
            if request.direction == Direction::BaselineToActive {
                exports.push((name.clone(), live));
            }
            debug!(module = %module, unit = %name, "changes found");
            units.push(UnitPatch {
                name,
                expected: result.expected,
                delta: result.delta,
            });
        }
    }

    let global_actions = request
        .global_actions
        .clone()
        .filter(|actions| !actions.is_empty());
    let record = PatchRecord {
        global_actions,
        units,
    };
    let text = codec::encode_record(format, &record)?;
    info!(units = record.units.len(), "patch generated");

    Ok(GeneratedPatch {
        changes_found: !record.units.is_empty(),
        global_actions: record.global_actions,
        units: record.units,
        text,
        exports,
    })
}

/// Overwrite the listed baselines with their live data. Returns how many
/// baseline files were written.
pub fn export_baselines<B: BaselineSource>(
    baselines: &mut B,
    generated: &GeneratedPatch,
) -> Result<usize> {
    let mut written = 0;
    for (name, data) in &generated.exports {
        if baselines.write(name, data)? {
            written += 1;
        }
    }
    info!(written, "baselines exported");
    Ok(written)
}

/// Append a generated patch to the patch file of `id`.
///
/// Refuses to add a unit or a `__global_actions` entry the file already has,
/// since the result would no longer decode.
pub fn write_generated(
    patches: &PatchStore,
    id: &UpdateId,
    generated: &GeneratedPatch,
) -> Result<PathBuf, PatchError> {
    let path = patches.resolve_path(id, true)?;
    let existing = match patches.load(id) {
        Ok(record) => record,
        Err(PatchError::NotFound { .. }) => PatchRecord::default(),
        Err(err) => return Err(err),
    };
    if existing.global_actions.is_some() && generated.global_actions.is_some() {
        return Err(PatchError::Format(format!(
            "{}: already has global actions",
            path.display()
        )));
    }
    if let Some(unit) = generated
        .units
        .iter()
        .find(|unit| existing.unit(&unit.name).is_some())
    {
        return Err(PatchError::Format(format!(
            "{}: already has an entry for `{}`",
            path.display(),
            unit.name
        )));
    }
    if generated.text.is_empty() {
        return Ok(path);
    }
    patches.append(&path, &generated.text)?;
    info!(path = %path.display(), "patch written");
    Ok(path)
}
