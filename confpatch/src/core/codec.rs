//! Patch text encoding and decoding.
//!
//! Every encoded block is one complete top-level entry, so blocks can be
//! appended to an existing patch file without touching earlier ones:
//!
//! ```text
//! <unit_name>:
//!   expected_config:
//!     <nested key: value>
//!   update_actions:
//!     delete:
//!       <nested key-path: old_value>
//!     add:
//!       <nested key-path: new_value>
//!     change:
//!       <nested key-path: new_value>
//! ```
//!
//! YAML blocks are single-key mappings; JSON blocks are single-key objects on
//! one line each.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::core::invariants::validate_unit;
use crate::core::types::{Delta, GLOBAL_ACTIONS_KEY, GlobalActions, PatchRecord, UnitPatch};
use crate::error::PatchError;
use crate::tree::{Map, deserialize_map};

/// Serialization format of patch files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchFormat {
    #[default]
    Yaml,
    Json,
}

impl PatchFormat {
    /// File extension for patch files in this format.
    pub fn extension(self) -> &'static str {
        match self {
            PatchFormat::Yaml => "yml",
            PatchFormat::Json => "json",
        }
    }
}

impl fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchFormat::Yaml => f.write_str("yaml"),
            PatchFormat::Json => f.write_str("json"),
        }
    }
}

/// Encode one unit block.
pub fn encode(
    format: PatchFormat,
    unit_name: &str,
    expected: &Map,
    delta: &Delta,
) -> Result<String, PatchError> {
    let deleted = delta.deleted_tree();
    let entry = UnitEntry {
        expected_config: expected,
        update_actions: UpdateActions {
            delete: &deleted,
            add: &delta.added,
            change: &delta.changed,
        },
    };
    encode_block(format, unit_name, &entry)
}

/// Encode the reserved `__global_actions` block.
pub fn encode_global_actions(
    format: PatchFormat,
    actions: &GlobalActions,
) -> Result<String, PatchError> {
    encode_block(format, GLOBAL_ACTIONS_KEY, actions)
}

/// Encode a whole record: global actions first, then units in record order.
pub fn encode_record(format: PatchFormat, record: &PatchRecord) -> Result<String, PatchError> {
    let mut text = String::new();
    if let Some(actions) = &record.global_actions {
        text.push_str(&encode_global_actions(format, actions)?);
    }
    for unit in &record.units {
        text.push_str(&encode(format, &unit.name, &unit.expected, &unit.delta)?);
    }
    Ok(text)
}

/// Decode patch text. Empty text is an empty record.
pub fn decode(format: PatchFormat, text: &str) -> Result<PatchRecord, PatchError> {
    if text.trim().is_empty() {
        return Ok(PatchRecord::default());
    }
    let record = match format {
        PatchFormat::Yaml => serde_yaml::from_str::<PatchRecord>(text)
            .map_err(|err| PatchError::Format(err.to_string()))?,
        PatchFormat::Json => decode_json_lines(text)?,
    };

    let errors: Vec<String> = record.units.iter().flat_map(validate_unit).collect();
    if !errors.is_empty() {
        return Err(PatchError::Format(errors.join("; ")));
    }
    Ok(record)
}

fn decode_json_lines(text: &str) -> Result<PatchRecord, PatchError> {
    let mut record = PatchRecord::default();
    let mut seen = HashSet::new();
    for block in serde_json::Deserializer::from_str(text).into_iter::<PatchRecord>() {
        let block = block.map_err(|err| PatchError::Format(err.to_string()))?;
        if let Some(actions) = block.global_actions {
            if record.global_actions.is_some() {
                return Err(PatchError::Format(format!(
                    "duplicate `{GLOBAL_ACTIONS_KEY}` entry"
                )));
            }
            record.global_actions = Some(actions);
        }
        for unit in block.units {
            if !seen.insert(unit.name.clone()) {
                return Err(PatchError::Format(format!("duplicate unit `{}`", unit.name)));
            }
            record.units.push(unit);
        }
    }
    Ok(record)
}

fn encode_block<T: Serialize>(
    format: PatchFormat,
    key: &str,
    value: &T,
) -> Result<String, PatchError> {
    let block = Block { key, value };
    match format {
        PatchFormat::Yaml => {
            serde_yaml::to_string(&block).map_err(|err| PatchError::Encode(err.to_string()))
        }
        PatchFormat::Json => {
            let mut line = serde_json::to_string(&block)
                .map_err(|err| PatchError::Encode(err.to_string()))?;
            line.push('\n');
            Ok(line)
        }
    }
}

/// Single-entry top-level mapping.
struct Block<'a, T> {
    key: &'a str,
    value: &'a T,
}

impl<T: Serialize> Serialize for Block<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, self.value)?;
        map.end()
    }
}

#[derive(Serialize)]
struct UnitEntry<'a> {
    expected_config: &'a Map,
    update_actions: UpdateActions<'a>,
}

/// Field order here is the on-disk key order.
#[derive(Serialize)]
struct UpdateActions<'a> {
    #[serde(skip_serializing_if = "is_empty")]
    delete: &'a Map,
    #[serde(skip_serializing_if = "is_empty")]
    add: &'a Map,
    #[serde(skip_serializing_if = "is_empty")]
    change: &'a Map,
}

fn is_empty(map: &&Map) -> bool {
    map.is_empty()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUnitEntry {
    #[serde(default, deserialize_with = "deserialize_map")]
    expected_config: Map,
    #[serde(default)]
    update_actions: Option<RawUpdateActions>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUpdateActions {
    #[serde(default, deserialize_with = "deserialize_map")]
    delete: Map,
    #[serde(default, deserialize_with = "deserialize_map")]
    add: Map,
    #[serde(default, deserialize_with = "deserialize_map")]
    change: Map,
}

impl RawUnitEntry {
    fn into_unit(self, name: String) -> UnitPatch {
        let delta = match self.update_actions {
            Some(actions) => Delta {
                deleted: Delta::deleted_from_tree(&actions.delete),
                added: actions.add,
                changed: actions.change,
            },
            None => Delta::default(),
        };
        UnitPatch {
            name,
            expected: self.expected_config,
            delta,
        }
    }
}

impl<'de> Deserialize<'de> for PatchRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = PatchRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of configuration names to update definitions")
    }

    fn visit_unit<E: de::Error>(self) -> Result<PatchRecord, E> {
        Ok(PatchRecord::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PatchRecord, A::Error> {
        let mut record = PatchRecord::default();
        let mut seen = HashSet::new();
        while let Some(name) = access.next_key::<String>()? {
            if name == GLOBAL_ACTIONS_KEY {
                if record.global_actions.is_some() {
                    return Err(de::Error::custom(format!(
                        "duplicate `{GLOBAL_ACTIONS_KEY}` entry"
                    )));
                }
                record.global_actions = Some(access.next_value()?);
                continue;
            }
            if !seen.insert(name.clone()) {
                return Err(de::Error::custom(format!("duplicate unit `{name}`")));
            }
            let entry: RawUnitEntry = access.next_value()?;
            record.units.push(entry.into_unit(name));
        }
        Ok(record)
    }
}
