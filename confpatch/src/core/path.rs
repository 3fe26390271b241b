//! Flattened key paths into configuration trees.

use std::fmt;

use crate::tree::{self, Map};

/// Ordered list of map keys locating one value.
///
/// Ordering is lexicographic by segment, which matches the depth-first order
/// of [`tree::leaves`] over sorted maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` segments of this path.
    pub fn prefix(&self, len: usize) -> KeyPath {
        KeyPath(self.0[..len.min(self.0.len())].to_vec())
    }

    /// True if `other` is this path or one of its ancestors.
    pub fn starts_with(&self, other: &KeyPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KeyPath(iter.into_iter().map(Into::into).collect())
    }
}

/// Renders as dot-separated segments, e.g. `settings.max_length`.
impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Key paths of every leaf in `map`, e.g. `{a: {b: 1}, c: 2}` gives
/// `[a, b]` and `[c]`.
pub fn flat_keys(map: &Map) -> Vec<KeyPath> {
    tree::leaves(map).into_iter().map(|(path, _)| path).collect()
}

/// Render a list of paths for human-readable messages.
pub fn join_paths(paths: &[KeyPath]) -> String {
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
