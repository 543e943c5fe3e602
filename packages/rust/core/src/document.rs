//! The document capability shared by everything couchpack writes out.
//!
//! A document carries a static [`DocSchema`] listing its well-known
//! properties. Reading merges properties from a JSON file, writing emits
//! pretty JSON, and validation checks that required properties exist with
//! the declared JSON type.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use couchpack_shared::{CouchpackError, Result};

/// JSON type a schema property must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Object,
    Array,
}

impl JsonType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One well-known property of a document.
#[derive(Debug, Clone, Copy)]
pub struct Property {
    pub name: &'static str,
    pub kind: JsonType,
    pub required: bool,
}

/// Static description of a document's well-known properties.
#[derive(Debug, Clone, Copy)]
pub struct DocSchema {
    pub properties: &'static [Property],
}

impl DocSchema {
    /// Human-readable problems with `doc`; empty when it conforms.
    pub fn check(&self, doc: &Value) -> Vec<String> {
        let Some(object) = doc.as_object() else {
            return vec!["document is not a JSON object".to_string()];
        };

        let mut issues = Vec::new();
        for property in self.properties {
            match object.get(property.name) {
                None if property.required => {
                    issues.push(format!("missing required property `{}`", property.name));
                }
                Some(value) if !property.kind.matches(value) => {
                    issues.push(format!(
                        "property `{}` must be of type {}",
                        property.name,
                        property.kind.as_str()
                    ));
                }
                _ => {}
            }
        }
        issues
    }
}

/// Common behavior of couchpack documents.
pub trait Document: Serialize {
    /// The schema this document is checked against.
    fn doc_schema(&self) -> &'static DocSchema;

    /// Document `_id`.
    fn id(&self) -> &str;

    /// Set one top-level property, as read from a file.
    fn set_property(&mut self, key: &str, value: Value) -> Result<()>;

    /// The document as JSON, ready to store.
    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Merge top-level properties from a JSON file. With `props`, only the
    /// named properties are taken.
    fn read(&mut self, path: &Path, props: Option<&[&str]>) -> Result<()> {
        let content = std::fs::read(path).map_err(|e| CouchpackError::io(path, e))?;
        let json: Map<String, Value> = serde_json::from_slice(&content)
            .map_err(|e| CouchpackError::parse(path, e.to_string()))?;

        for (key, value) in json {
            if props.is_none_or(|wanted| wanted.contains(&key.as_str())) {
                self.set_property(&key, value)?;
            }
        }
        debug!(path = %path.display(), id = %self.id(), "merged document properties");
        Ok(())
    }

    /// Write the document as pretty JSON, creating parent directories.
    fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CouchpackError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.to_value()?)?;
        std::fs::write(path, json).map_err(|e| CouchpackError::io(path, e))?;
        debug!(path = %path.display(), id = %self.id(), "wrote document");
        Ok(())
    }

    /// Check the document against its schema.
    fn validate(&self) -> Result<()> {
        let issues = self.doc_schema().check(&self.to_value()?);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(CouchpackError::validation(format!(
                "{}: {}",
                self.id(),
                issues.join("; ")
            )))
        }
    }

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
