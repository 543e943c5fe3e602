//! Executable source text embedded in design documents.
//!
//! Map/reduce, list, show, and validation functions are stored as source
//! text. Inside arbitrary JSON, such a field is marked with a one-key object
//! `{"$source": "<text>"}` so it cannot be confused with an ordinary string;
//! [`serialize_sources`] replaces every marker with its plain text before
//! the document is written out.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Marker key for executable source inside JSON values.
pub const SOURCE_TAG: &str = "$source";

/// Source text of a function evaluated by the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source(String);

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The text carried by a marker object, if `value` is one.
    pub fn from_marker(value: &Value) -> Option<&str> {
        let object = value.as_object()?;
        if object.len() != 1 {
            return None;
        }
        object.get(SOURCE_TAG)?.as_str()
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes as a marker object so it survives `serde_json::json!`.
impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(SOURCE_TAG, &self.0)?;
        map.end()
    }
}

/// Replace every source marker in `value` with its text, in place.
///
/// Objects and arrays are walked recursively; other values are untouched.
pub fn serialize_sources(value: &mut Value) -> &mut Value {
    if let Some(text) = Source::from_marker(value) {
        *value = Value::String(text.to_owned());
        return value;
    }

    match value {
        Value::Object(map) => {
            for field in map.values_mut() {
                serialize_sources(field);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                serialize_sources(item);
            }
        }
        _ => {}
    }
    value
}
