//! Generic structural diff over JSON trees.
//!
//! Produces the four-way change taxonomy the comparison pipeline works with:
//! `N`ew, `D`eleted, `E`dited and `A`rray-change. Paths are built by
//! construction while walking, so `content.sections.0.content.steps.2` style
//! semantics are guaranteed rather than conventional.

use serde_json::Value;
use std::fmt;

/// Classification of a single structural difference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Present on the right side only.
    New,
    /// Present on the left side only.
    Deleted,
    /// Present on both sides with different values.
    Edited,
    /// An array grew or shrank; the element-level change is nested in `item`.
    ArrayChange,
}

impl ChangeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "N",
            Self::Deleted => "D",
            Self::Edited => "E",
            Self::ArrayChange => "A",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a change path: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A single structural difference between two trees.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Path from the comparison root to the changed value. For
    /// [`ChangeKind::ArrayChange`] this is the path of the array itself.
    pub path: Vec<PathSeg>,
    /// Left (older) value, where one exists.
    pub lhs: Option<Value>,
    /// Right (newer) value, where one exists.
    pub rhs: Option<Value>,
    /// Affected element index, for array changes.
    pub index: Option<usize>,
    /// The element-level change, for array changes.
    pub item: Option<Box<Change>>,
}

impl Change {
    fn leaf(kind: ChangeKind, path: Vec<PathSeg>, lhs: Option<Value>, rhs: Option<Value>) -> Self {
        Self {
            kind,
            path,
            lhs,
            rhs,
            index: None,
            item: None,
        }
    }

    /// The last object key on the path, if any.
    pub fn last_key(&self) -> Option<&str> {
        self.path.iter().rev().find_map(|seg| match seg {
            PathSeg::Key(key) => Some(key.as_str()),
            PathSeg::Index(_) => None,
        })
    }

    /// The change kind as presented to users: array changes report the
    /// nested element change's kind.
    pub fn effective_kind(&self) -> ChangeKind {
        match (&self.kind, &self.item) {
            (ChangeKind::ArrayChange, Some(item)) => item.kind,
            (kind, _) => *kind,
        }
    }

    /// The path with array indices stripped, dot-joined. Used as a
    /// grouping key for paths outside the sections array.
    pub fn keys_path(&self) -> String {
        let keys: Vec<&str> = self
            .path
            .iter()
            .filter_map(|seg| match seg {
                PathSeg::Key(key) => Some(key.as_str()),
                PathSeg::Index(_) => None,
            })
            .collect();
        keys.join(".")
    }

    /// The full path, dot-joined, for display and logs.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(PathSeg::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Computes the structural differences between two JSON trees.
///
/// Object keys present on one side only yield `N`/`D`; diverging scalars or
/// mismatched value types yield `E`; array length changes yield one `A` per
/// surplus element with the element change nested.
pub fn diff_values(lhs: &Value, rhs: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    walk(&mut Vec::new(), lhs, rhs, &mut changes);
    changes
}

fn walk(path: &mut Vec<PathSeg>, lhs: &Value, rhs: &Value, out: &mut Vec<Change>) {
    if lhs == rhs {
        return;
    }

    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                path.push(PathSeg::Key(key.clone()));
                match right.get(key) {
                    Some(right_value) => walk(path, left_value, right_value, out),
                    None => out.push(Change::leaf(
                        ChangeKind::Deleted,
                        path.clone(),
                        Some(left_value.clone()),
                        None,
                    )),
                }
                path.pop();
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    path.push(PathSeg::Key(key.clone()));
                    out.push(Change::leaf(
                        ChangeKind::New,
                        path.clone(),
                        None,
                        Some(right_value.clone()),
                    ));
                    path.pop();
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let common = left.len().min(right.len());
            for index in 0..common {
                path.push(PathSeg::Index(index));
                walk(path, &left[index], &right[index], out);
                path.pop();
            }
            for (index, right_value) in right.iter().enumerate().skip(common) {
                out.push(Change {
                    kind: ChangeKind::ArrayChange,
                    path: path.clone(),
                    lhs: None,
                    rhs: None,
                    index: Some(index),
                    item: Some(Box::new(Change::leaf(
                        ChangeKind::New,
                        Vec::new(),
                        None,
                        Some(right_value.clone()),
                    ))),
                });
            }
            for (index, left_value) in left.iter().enumerate().skip(common) {
                out.push(Change {
                    kind: ChangeKind::ArrayChange,
                    path: path.clone(),
                    lhs: None,
                    rhs: None,
                    index: Some(index),
                    item: Some(Box::new(Change::leaf(
                        ChangeKind::Deleted,
                        Vec::new(),
                        Some(left_value.clone()),
                        None,
                    ))),
                });
            }
        }
        _ => out.push(Change::leaf(
            ChangeKind::Edited,
            path.clone(),
            Some(lhs.clone()),
            Some(rhs.clone()),
        )),
    }
}
