//! proptest strategies for manifest trees.

use super::Manifest;
use proptest::prelude::*;
use serde_json::Value;

/// File suffixes the generated trees are diffed with.
pub(crate) const FILE_EXTENSIONS: [&str; 2] = [".json", ".xml"];

/// Whether `key` ends in one of [`FILE_EXTENSIONS`], ignoring case.
pub(crate) fn has_file_extension(key: &str) -> bool {
    let key = key.to_lowercase();
    FILE_EXTENSIONS.iter().any(|ext| key.ends_with(ext))
}

/// Keys that mix plain names, file names with mixed-case suffixes and
/// names with unrelated suffixes.
pub(crate) fn arb_key() -> impl Strategy<Value = String> {
    let suffix = prop_oneof![
        Just(".json"),
        Just(".JSON"),
        Just(".Json"),
        Just(".xml"),
        Just(".XmL"),
        Just(".txt"),
        Just(".jsonp"),
        Just(""),
    ];
    ("[a-z][a-z0-9_]{0,5}", suffix).prop_map(|(stem, ext)| format!("{stem}{ext}"))
}

fn arb_leaf() -> impl Strategy<Value = Manifest> {
    prop_oneof![
        4 => "[a-f0-9]{4,10}".prop_map(|h| Manifest::Leaf(Value::String(h))),
        1 => any::<u32>().prop_map(|n| Manifest::Leaf(Value::from(n))),
    ]
}

fn arb_node(child: impl Strategy<Value = Manifest>) -> impl Strategy<Value = Manifest> {
    prop::collection::btree_map(arb_key(), child, 0..6)
        .prop_map(|entries| Manifest::Node(entries.into_iter().collect()))
}

/// Nested manifests whose root is always a mapping.
pub(crate) fn arb_manifest() -> impl Strategy<Value = Manifest> {
    let tree = arb_leaf().prop_recursive(4, 48, 6, arb_node);
    arb_node(tree)
}

/// Every leaf under a file-named key, as `(path, value)`.
pub(crate) fn file_leaves(manifest: &Manifest) -> Vec<(Vec<String>, Value)> {
    fn walk(node: &Manifest, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
        for (key, child) in node.entries() {
            prefix.push(key.clone());
            match child {
                Manifest::Node(_) => walk(child, prefix, out),
                Manifest::Leaf(value) if has_file_extension(key) => out.push((prefix.clone(), value.clone())),
                Manifest::Leaf(_) => {}
            }
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    walk(manifest, &mut Vec::new(), &mut out);
    out
}

/// Copy of `manifest` with the value of every non-file leaf changed.
pub(crate) fn with_non_file_leaves_changed(manifest: &Manifest) -> Manifest {
    match manifest {
        Manifest::Node(entries) => Manifest::Node(
            entries
                .iter()
                .map(|(key, child)| {
                    let child = match child {
                        Manifest::Leaf(_) if !has_file_extension(key) => {
                            Manifest::Leaf(Value::String(format!("changed-{key}")))
                        }
                        other => with_non_file_leaves_changed(other),
                    };
                    (key.clone(), child)
                })
                .collect(),
        ),
        leaf => leaf.clone(),
    }
}
