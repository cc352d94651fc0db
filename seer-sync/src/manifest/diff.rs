//! Manifest diffing.
//!
//! Walks the freshly fetched manifest against the last synced one and
//! reports every file leaf whose token changed. Keys only present in the old
//! manifest are ignored: deletions are never surfaced.

use super::{leaf_token, KeyPath, Manifest};
use serde_json::Value;
use std::collections::HashMap;

/// One file that needs downloading.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedFile {
    /// Keys of the mappings enclosing the file
    pub parent: KeyPath,

    /// The file's key, used as the local filename
    pub key: String,

    /// New leaf value. Its token names the file on the server
    pub value: Value,

    /// Whatever the old manifest held at this key
    pub previous: Option<Manifest>,
}

impl ChangedFile {
    /// Path of the resource on the server: parent keys plus the new token.
    pub fn remote_path(&self) -> KeyPath {
        self.parent.child(leaf_token(&self.value))
    }

    /// Path of the file in the local mirror: parent keys plus the key.
    /// This is also where the leaf sits in the manifest.
    pub fn local_path(&self) -> KeyPath {
        self.parent.child(self.key.clone())
    }
}

/// Compares manifests, treating keys with a recognized suffix as files.
#[derive(Debug, Clone)]
pub struct ManifestDiffer {
    extensions: Vec<String>,
}

impl ManifestDiffer {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether `key` names a file, by case-insensitive suffix.
    pub fn is_file_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.extensions.iter().any(|ext| key.ends_with(ext.as_str()))
    }

    /// Changed file leaves of `new` relative to `old`, in `new`'s order.
    ///
    /// A missing `old`, or an `old` that is not a mapping, counts as empty.
    pub fn diff(&self, old: Option<&Manifest>, new: &Manifest, base: &KeyPath) -> Vec<ChangedFile> {
        let mut changed = Vec::new();
        self.walk(old, new, base, &mut changed);
        changed
    }

    /// Diff only the sub-trees at `scopes`, each with its scope as base path.
    /// No scopes means the whole tree.
    pub fn diff_scoped(&self, old: &Manifest, new: &Manifest, scopes: &[KeyPath]) -> Vec<ChangedFile> {
        if scopes.is_empty() {
            return self.diff(Some(old), new, &KeyPath::new());
        }

        let mut changed = Vec::new();
        for scope in scopes {
            let Some(new_scope) = new.get_path(scope.segments()) else {
                continue;
            };
            let old_scope = old.get_path(scope.segments());
            self.walk(old_scope, new_scope, scope, &mut changed);
        }
        changed
    }

    fn walk(&self, old: Option<&Manifest>, new: &Manifest, base: &KeyPath, out: &mut Vec<ChangedFile>) {
        let Manifest::Node(entries) = new else {
            return;
        };

        let old_index: HashMap<&str, &Manifest> = old
            .map(|o| o.entries().iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default();

        for (key, new_val) in entries {
            let old_val = old_index.get(key.as_str()).copied();

            match new_val {
                Manifest::Node(_) => {
                    self.walk(old_val, new_val, &base.child(key.clone()), out);
                }
                Manifest::Leaf(value) => {
                    if !self.is_file_key(key) {
                        continue;
                    }
                    let unchanged = matches!(old_val, Some(Manifest::Leaf(old)) if old == value);
                    if !unchanged {
                        out.push(ChangedFile {
                            parent: base.clone(),
                            key: key.clone(),
                            value: value.clone(),
                            previous: old_val.cloned(),
                        });
                    }
                }
            }
        }
    }
}

impl Default for ManifestDiffer {
    fn default() -> Self {
        Self::new([".json"])
    }
}
