//! Configuration tree values and the path operations shared by every component.
//!
//! A configuration unit is a [`Map`] of string keys to [`Value`]s. Maps keep
//! their keys sorted, which makes every serialized form deterministic.
//!
//! A *leaf* is any value that is not a non-empty map: scalars, lists and the
//! empty map. Flattening a tree with [`leaves`] yields one key path per leaf.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::core::path::KeyPath;

/// Ordered map of configuration keys.
pub type Map = BTreeMap<String, Value>;

/// One node of a configuration tree.
///
/// Scalars keep their type through every codec: `Bool(true)` never equals
/// `String("true")` and `Int(1)` never equals `Float(1.0)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
}

impl Value {
    /// True for scalars, lists and empty maps.
    pub fn is_leaf(&self) -> bool {
        match self {
            Value::Map(map) => map.is_empty(),
            _ => true,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

/// Return the value at `path`, or `None` if any segment is missing or a
/// non-map value is reached before the path ends. The empty path addresses
/// nothing.
pub fn get_path<'a>(map: &'a Map, path: &KeyPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = map.get(first)?;
    for segment in rest {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

/// Set `value` at `path`, creating intermediate maps. An intermediate
/// non-map value is replaced by a map.
pub fn set_path(map: &mut Map, path: &KeyPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Map(Map::new()));
        if !matches!(entry, Value::Map(_)) {
            *entry = Value::Map(Map::new());
        }
        let Value::Map(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

/// Remove the value at `path` and return it. Missing paths are ignored.
/// Parent maps are kept even when they become empty.
pub fn delete_path(map: &mut Map, path: &KeyPath) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = map;
    for segment in parents {
        current = current.get_mut(segment)?.as_map_mut()?;
    }
    current.remove(last)
}

/// Merge `source` into `target`.
///
/// Maps merge recursively key by key. Scalars and lists replace wholesale, and
/// a map in `source` replaces a non-map in `target`.
pub fn merge_deep(target: &mut Map, source: &Map) {
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => merge_deep(existing, incoming),
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Flatten `map` into `(path, leaf)` pairs, depth first in key order.
pub fn leaves(map: &Map) -> Vec<(KeyPath, &Value)> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    collect_leaves(map, &mut prefix, &mut out);
    out
}

fn collect_leaves<'a>(map: &'a Map, prefix: &mut Vec<String>, out: &mut Vec<(KeyPath, &'a Value)>) {
    for (key, value) in map {
        prefix.push(key.clone());
        match value {
            Value::Map(inner) if !inner.is_empty() => collect_leaves(inner, prefix, out),
            _ => out.push((KeyPath::new(prefix.clone()), value)),
        }
        prefix.pop();
    }
}

/// True if every entry of `needle` is present in `haystack`.
///
/// Maps in `needle` must meet a map at the same position (an empty map only
/// requires that). Everything else must be present and exactly equal.
pub fn contains(haystack: &Map, needle: &Map) -> bool {
    needle
        .iter()
        .all(|(key, expected)| match (haystack.get(key), expected) {
            (Some(Value::Map(actual)), Value::Map(expected)) => contains(actual, expected),
            (Some(_), Value::Map(_)) | (None, _) => false,
            (Some(actual), expected) => actual == expected,
        })
}

/// Leaf paths of `needle` that `haystack` does not match, in key order.
pub fn mismatched_paths(haystack: &Map, needle: &Map) -> Vec<KeyPath> {
    leaves(needle)
        .into_iter()
        .filter(|(path, expected)| match (get_path(haystack, path), expected) {
            (Some(actual), Value::Map(_)) => !matches!(actual, Value::Map(_)),
            (Some(actual), expected) => actual != *expected,
            (None, _) => true,
        })
        .map(|(path, _)| path)
        .collect()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Value, E> {
        Ok(Value::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Value, E> {
        Ok(Value::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Value, E> {
        i64::try_from(value)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {value} is out of range")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Value, E> {
        Ok(Value::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Value, E> {
        Ok(Value::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Value, E> {
        Ok(Value::String(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some(MapKey(key)) = access.next_key()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

/// Map key accepting the scalar key forms YAML allows, normalized to strings.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl Visitor<'_> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar map key")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<MapKey, E> {
        Ok(MapKey(value))
    }
}

/// Deserialize a [`Map`], treating an explicit null as the empty map.
pub fn deserialize_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(de::Error::custom("expected a mapping")),
    }
}
