//! JSON Patch (RFC 6902) operations and the structural diff that produces them.

use std::fmt;

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a patch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Remove,
    Replace,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single patch operation against a JSON pointer
///
/// Serializes to the RFC 6902 wire form, e.g.
/// `{"op": "add", "path": "/spec/x", "value": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: PointerBuf, value: Value },
    Remove { path: PointerBuf },
    Replace { path: PointerBuf, value: Value },
}

impl PatchOp {
    pub fn add(path: PointerBuf, value: impl Into<Value>) -> Self {
        Self::Add {
            path,
            value: value.into(),
        }
    }

    pub fn remove(path: PointerBuf) -> Self {
        Self::Remove { path }
    }

    pub fn replace(path: PointerBuf, value: impl Into<Value>) -> Self {
        Self::Replace {
            path,
            value: value.into(),
        }
    }

    pub const fn operation(&self) -> Operation {
        match self {
            Self::Add { .. } => Operation::Add,
            Self::Remove { .. } => Operation::Remove,
            Self::Replace { .. } => Operation::Replace,
        }
    }

    pub fn path(&self) -> &PointerBuf {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    /// The value written by the operation, `None` for removals
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Add { value, .. } | Self::Replace { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }
}

impl From<PatchOp> for PatchOperation {
    fn from(op: PatchOp) -> Self {
        match op {
            PatchOp::Add { path, value } => PatchOperation::Add(AddOperation { path, value }),
            PatchOp::Remove { path } => PatchOperation::Remove(RemoveOperation { path }),
            PatchOp::Replace { path, value } => {
                PatchOperation::Replace(ReplaceOperation { path, value })
            }
        }
    }
}

/// Builds a `json_patch` document from a sequence of operations
pub fn into_patch(ops: impl IntoIterator<Item = PatchOp>) -> Patch {
    Patch(ops.into_iter().map(PatchOperation::from).collect())
}

/// Applies `ops` to `doc` in order
///
/// On error `doc` may be partially modified and should be discarded.
pub fn apply(doc: &mut Value, ops: &[PatchOp]) -> Result<(), json_patch::PatchError> {
    let operations: Vec<PatchOperation> = ops.iter().cloned().map(Into::into).collect();
    json_patch::patch(doc, &operations)
}

/// Computes the operations that turn `before` into `after`
///
/// Objects are compared key by key in the declaration order of `after`,
/// followed by removals in the order of `before`. Arrays and scalars that
/// differ are replaced whole.
pub fn diff(before: &Value, after: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_into(&mut ops, PointerBuf::new(), before, after);
    ops
}

fn diff_into(ops: &mut Vec<PatchOp>, path: PointerBuf, before: &Value, after: &Value) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, new_value) in new {
                let child = child_path(&path, key);
                match old.get(key) {
                    Some(old_value) => diff_into(ops, child, old_value, new_value),
                    None => ops.push(PatchOp::add(child, new_value.clone())),
                }
            }
            for key in old.keys().filter(|key| !new.contains_key(key.as_str())) {
                ops.push(PatchOp::remove(child_path(&path, key)));
            }
        }
        (old, new) if old == new => {}
        (_, new) => ops.push(PatchOp::replace(path, new.clone())),
    }
}

fn child_path(parent: &PointerBuf, token: &str) -> PointerBuf {
    let mut path = parent.clone();
    path.push_back(token);
    path
}
