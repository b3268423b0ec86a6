#![forbid(unsafe_code)]

//! Path segments and addressing helpers for the lens data tree.
//!
//! A path is an ordered list of [`PathSegment`]s from the tree root. Object
//! members are addressed by [`PathSegment::Key`], array elements by
//! [`PathSegment::Index`].
//!
//! # Write Semantics
//!
//! [`write_at`] creates missing intermediate containers: a key segment turns a
//! non-object into an empty object, an index segment turns a non-array into an
//! empty array and pads it with `null` up to the index.
//!
//! # Failure Modes
//!
//! An index more than [`MAX_INDEX_GAP`] past the end of its array is refused:
//! [`write_at`] leaves the tree untouched and returns `false`.

use std::fmt;

use serde_json::Value;

/// One step of a path from the tree root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Owned path from the tree root.
pub type Path = Vec<PathSegment>;

/// Render a path as `a.b[0].c`. The root renders as `$`.
#[must_use]
pub fn display_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "$".to_owned();
    }
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                out.push_str(&format!("[{index}]"));
            }
        }
    }
    out
}

/// Whether `prefix` is a (non-strict) prefix of `path`.
#[must_use]
pub fn is_prefix(prefix: &[PathSegment], path: &[PathSegment]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

/// Borrow the value at `path`, if every segment resolves.
#[must_use]
pub fn value_at<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| match segment {
        PathSegment::Key(key) => node.as_object()?.get(key),
        PathSegment::Index(index) => node.as_array()?.get(*index),
    })
}

/// Largest number of `null` slots a single write may pad an array with.
pub const MAX_INDEX_GAP: usize = 1 << 16;

/// Replace the value at `path`, creating intermediate containers as needed.
///
/// Returns `false` without touching the tree when an index segment lies
/// beyond [`MAX_INDEX_GAP`] of padding.
pub fn write_at(root: &mut Value, path: &[PathSegment], value: Value) -> bool {
    if let Some(index) = unreachable_index(root, path) {
        tracing::warn!(index, path = %display_path(path), "array index out of reach; write skipped");
        return false;
    }
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return true;
    };
    let mut node = root;
    for segment in parents {
        node = child_mut(node, segment);
    }
    *child_mut(node, last) = value;
    true
}

fn unreachable_index(root: &Value, path: &[PathSegment]) -> Option<usize> {
    let mut node = Some(root);
    for segment in path {
        match segment {
            PathSegment::Key(key) => node = node.and_then(|n| n.as_object()?.get(key)),
            PathSegment::Index(index) => {
                let items = node.and_then(Value::as_array);
                let len = items.map_or(0, Vec::len);
                if *index > len.saturating_add(MAX_INDEX_GAP) {
                    return Some(*index);
                }
                node = items.and_then(|items| items.get(*index));
            }
        }
    }
    None
}

fn child_mut<'a>(node: &'a mut Value, segment: &PathSegment) -> &'a mut Value {
    match segment {
        PathSegment::Key(key) => {
            // Indexing a `null` by key inserts into a fresh object.
            if !node.is_object() {
                *node = Value::Null;
            }
            &mut node[key.as_str()]
        }
        PathSegment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = node
                && let Some(len) = index.checked_add(1)
                && items.len() < len
            {
                items.resize(len, Value::Null);
            }
            &mut node[*index]
        }
    }
}
