//! Dot-paths for `match:extractField`.
//!
//! `a.b.c` walks object keys, `a.0.c` indexes arrays, and `a.*.c` maps
//! over every element, producing an array of the values that resolve.
//! A missing intermediate key is a miss: extraction returns `None` and
//! the operator fails (unless wrapped in `match:not`).

use serde_json::Value;

/// One step of a dot-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key lookup.
    Key(String),
    /// Array index (also tried as an object key, for maps with numeric
    /// keys).
    Index(usize),
    /// Map over all elements of an array or all values of an object.
    Wildcard,
}

/// A parsed `extractField` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a dot-path. Empty paths and empty segments are rejected.
    ///
    /// # Errors
    ///
    /// Returns a description of the malformed path.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err(String::from("field path must not be empty"));
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(format!("field path '{raw}' has an empty segment"));
            }
            let segment = if part == "*" {
                Segment::Wildcard
            } else if let Ok(index) = part.parse::<usize>() {
                Segment::Index(index)
            } else {
                Segment::Key(part.to_string())
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The path as authored.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Extracts the addressed subvalue(s) from `value`.
    ///
    /// Wildcard segments produce an array (possibly empty) of the values
    /// whose tail path resolved. Returns `None` when the path misses.
    #[must_use]
    pub fn extract(&self, value: &Value) -> Option<Value> {
        walk(value, &self.segments)
    }
}

fn walk(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match head {
        Segment::Key(key) => value.as_object()?.get(key).and_then(|v| walk(v, rest)),
        Segment::Index(index) => match value {
            Value::Array(items) => items.get(*index).and_then(|v| walk(v, rest)),
            Value::Object(map) => map.get(&index.to_string()).and_then(|v| walk(v, rest)),
            _ => None,
        },
        Segment::Wildcard => match value {
            Value::Array(items) => Some(Value::Array(
                items.iter().filter_map(|v| walk(v, rest)).collect(),
            )),
            Value::Object(map) => Some(Value::Array(
                map.values().filter_map(|v| walk(v, rest)).collect(),
            )),
            _ => None,
        },
    }
}
