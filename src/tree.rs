//! The uniform in-memory tree that flow definitions are normalized into.
//!
//! Flow definitions arrive as JSON, or for legacy flows as an XML document
//! that an external adapter has already converted. Both are represented by
//! [`OpaqueTree`] so the parser's pattern matching is format-agnostic.

use serde_json::Value as JsonValue;
use std::fmt;

/// A format-agnostic view of one flow definition.
///
/// Object keys keep their source order so that traversal (and therefore
/// diagnostic paths and usage order) is deterministic for a given input.
#[derive(Debug, Clone, PartialEq)]
pub enum OpaqueTree {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<OpaqueTree>),
    Object(Vec<(String, OpaqueTree)>),
}

impl OpaqueTree {
    /// Returns the string payload of a `String` node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OpaqueTree::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up an object entry by case-insensitive key.
    pub fn get_ci(&self, key: &str) -> Option<&OpaqueTree> {
        match self {
            OpaqueTree::Object(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, OpaqueTree::Object(_))
    }
}

impl From<JsonValue> for OpaqueTree {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => OpaqueTree::Null,
            JsonValue::Bool(b) => OpaqueTree::Bool(b),
            JsonValue::Number(n) => OpaqueTree::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => OpaqueTree::String(s),
            JsonValue::Array(items) => {
                OpaqueTree::Array(items.into_iter().map(OpaqueTree::from).collect())
            }
            JsonValue::Object(map) => OpaqueTree::Object(
                map.into_iter()
                    .map(|(k, v)| (k, OpaqueTree::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&JsonValue> for OpaqueTree {
    fn from(value: &JsonValue) -> Self {
        OpaqueTree::from(value.clone())
    }
}

/// A trait for adapters that convert a custom or legacy flow format into an
/// [`OpaqueTree`].
///
/// JSON definitions already convert via `From<serde_json::Value>`; this trait
/// is the extension point for everything else (for example the XML-based
/// legacy flow format, whose adapter lives outside this crate).
pub trait IntoTree {
    /// Consumes the object and converts it into the canonical tree shape.
    fn into_tree(self) -> Result<OpaqueTree, TreeConversionError>;
}

/// Errors that can occur when converting a custom format into an `OpaqueTree`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TreeConversionError {
    #[error("Invalid source document: {0}")]
    ValidationError(String),
}

/// One step of a path from the definition root to a discovered usage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// An ordered list of keys/indices locating a node inside a definition tree.
///
/// Carried on every discovered usage purely for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct TreePath(pub Vec<PathSegment>);

impl TreePath {
    pub fn root() -> Self {
        TreePath(Vec::new())
    }

    pub fn push_key(&mut self, key: &str) {
        self.0.push(PathSegment::Key(key.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.0.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}
