//! Version manifest model.
//!
//! The remote catalog is a nested JSON object such as
//! `files → resource → config → json → <filename> → <hash>`. It is held as a
//! [`Manifest`] tree whose nodes keep the document's key order, so that
//! diffing and re-serialization follow the server's ordering.

pub mod diff;
#[cfg(test)]
pub(crate) mod strategy;

use crate::utils::errors::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A manifest tree: either a mapping of named children or an opaque leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Manifest {
    /// Mapping from key to child, in document order.
    Node(Vec<(String, Manifest)>),
    /// Any non-object JSON value. Usually a hash or version string.
    Leaf(Value),
}

impl Manifest {
    /// The empty mapping, the state before the first sync.
    pub fn empty() -> Self {
        Manifest::Node(Vec::new())
    }

    /// Parse a whole manifest document. The root must be a mapping.
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|source| SyncError::InvalidJson {
                path: origin.to_string(),
                source,
            })?;
        if !manifest.is_node() {
            return Err(SyncError::NotAMapping(origin.to_string()));
        }
        Ok(manifest)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Manifest::Node(_))
    }

    /// Children of a node. A leaf has none.
    pub fn entries(&self) -> &[(String, Manifest)] {
        match self {
            Manifest::Node(entries) => entries,
            Manifest::Leaf(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Manifest> {
        self.entries().iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Follow `path` from this node. Any missing key or leaf along the way
    /// yields `None`.
    pub fn get_path(&self, path: &[String]) -> Option<&Manifest> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Place `value` at `path`, creating intermediate mappings as needed.
    /// A leaf found where a mapping is required is replaced by one.
    pub fn set_path(&mut self, path: &[String], value: Manifest) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };

        let mut node = self;
        for key in parents {
            node = node.child_mut_or_insert(key);
        }
        *node.child_mut_or_insert(last) = value;
    }

    /// Remove and return the entry at `path`, if present.
    pub fn remove_path(&mut self, path: &[String]) -> Option<Manifest> {
        let (last, parents) = path.split_last()?;

        let mut node = self;
        for key in parents {
            node = match node {
                Manifest::Node(entries) => entries
                    .iter_mut()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v)?,
                Manifest::Leaf(_) => return None,
            };
        }

        match node {
            Manifest::Node(entries) => {
                let idx = entries.iter().position(|(k, _)| k == last)?;
                Some(entries.remove(idx).1)
            }
            Manifest::Leaf(_) => None,
        }
    }

    /// Number of leaves reachable from this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Manifest::Node(entries) => entries.iter().map(|(_, v)| v.leaf_count()).sum(),
            Manifest::Leaf(_) => 1,
        }
    }

    fn child_mut_or_insert(&mut self, key: &str) -> &mut Manifest {
        match self {
            Manifest::Node(entries) => {
                let idx = match entries.iter().position(|(k, _)| k == key) {
                    Some(idx) => idx,
                    None => {
                        entries.push((key.to_string(), Manifest::empty()));
                        entries.len() - 1
                    }
                };
                &mut entries[idx].1
            }
            Manifest::Leaf(_) => {
                *self = Manifest::empty();
                self.child_mut_or_insert(key)
            }
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest::empty()
    }
}

impl From<Value> for Manifest {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Manifest::Node(map.into_iter().map(|(k, v)| (k, Manifest::from(v))).collect())
            }
            other => Manifest::Leaf(other),
        }
    }
}

impl From<Manifest> for Value {
    fn from(manifest: Manifest) -> Self {
        match manifest {
            Manifest::Node(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
            Manifest::Leaf(value) => value,
        }
    }
}

/// Text form of a leaf as it appears in a download path: strings verbatim,
/// anything else as its JSON rendering.
pub fn leaf_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An ordered list of manifest keys. Joined with `/` only at I/O edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Segments with a single leading `prefix` segment removed, if present.
    pub fn without_prefix(&self, prefix: Option<&str>) -> &[String] {
        match (prefix, self.0.split_first()) {
            (Some(prefix), Some((first, rest))) if first == prefix => rest,
            _ => &self.0,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
