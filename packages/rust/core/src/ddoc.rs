//! Design documents: views, lists, shows, schemas, rewrites, attachments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use couchpack_loader::{Accumulator, LoadInput, Loader, default_loader};
use couchpack_shared::{Attachments, CouchpackError, Result};

use crate::document::{DocSchema, Document, JsonType, Property};
use crate::source::{Source, serialize_sources};

/// Prefix shared by every design document id.
pub const DESIGN_PREFIX: &str = "_design/";

const DEFAULT_NAME: &str = "app";

/// Fields kept outside the body.
const RESERVED: [&str; 3] = ["_id", "_rev", "_attachments"];

const VIEWS: &str = "views";
const LISTS: &str = "lists";
const SHOWS: &str = "shows";
const SCHEMAS: &str = "schemas";
const REWRITES: &str = "rewrites";
const VALIDATE_DOC_UPDATE: &str = "validate_doc_update";

static DESIGN_DOC_SCHEMA: DocSchema = DocSchema {
    properties: &[
        Property {
            name: "_id",
            kind: JsonType::String,
            required: true,
        },
        Property {
            name: "_rev",
            kind: JsonType::String,
            required: false,
        },
        Property {
            name: "_attachments",
            kind: JsonType::Object,
            required: false,
        },
        Property {
            name: VIEWS,
            kind: JsonType::Object,
            required: true,
        },
        Property {
            name: LISTS,
            kind: JsonType::Object,
            required: true,
        },
        Property {
            name: SHOWS,
            kind: JsonType::Object,
            required: true,
        },
        Property {
            name: SCHEMAS,
            kind: JsonType::Object,
            required: true,
        },
        Property {
            name: REWRITES,
            kind: JsonType::Array,
            required: true,
        },
        Property {
            name: VALIDATE_DOC_UPDATE,
            kind: JsonType::String,
            required: false,
        },
    ],
};

/// A design document under construction.
///
/// Everything except `_id`, `_rev` and `_attachments` lives in one JSON
/// body, so tree loads whose directory is named `views` or `lists` merge
/// into the same containers the registration methods write to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(rename = "_attachments", default)]
    attachments: Attachments,
    #[serde(flatten)]
    body: Map<String, Value>,
}

impl Default for DesignDoc {
    fn default() -> Self {
        Self::new(DEFAULT_NAME)
    }
}

impl DesignDoc {
    /// New design document `_design/<name>` with empty containers. An empty
    /// name gives `_design/app`.
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() { DEFAULT_NAME } else { name };
        let mut body = Map::new();
        for section in [VIEWS, LISTS, SHOWS, SCHEMAS] {
            body.insert(section.to_string(), Value::Object(Map::new()));
        }
        body.insert(REWRITES.to_string(), Value::Array(Vec::new()));

        Self {
            id: format!("{DESIGN_PREFIX}{name}"),
            rev: None,
            attachments: Attachments::new(),
            body,
        }
    }

    /// The name after `_design/`.
    pub fn name(&self) -> &str {
        self.id.strip_prefix(DESIGN_PREFIX).unwrap_or(&self.id)
    }

    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Any top-level body property (`views`, a loaded namespace, ...).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn views(&self) -> Option<&Map<String, Value>> {
        self.body.get(VIEWS).and_then(Value::as_object)
    }

    pub fn lists(&self) -> Option<&Map<String, Value>> {
        self.body.get(LISTS).and_then(Value::as_object)
    }

    pub fn shows(&self) -> Option<&Map<String, Value>> {
        self.body.get(SHOWS).and_then(Value::as_object)
    }

    pub fn schemas(&self) -> Option<&Map<String, Value>> {
        self.body.get(SCHEMAS).and_then(Value::as_object)
    }

    pub fn rewrites(&self) -> &[Value] {
        self.body
            .get(REWRITES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn validate_doc_update(&self) -> Option<&str> {
        self.body.get(VALIDATE_DOC_UPDATE).and_then(Value::as_str)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Add a view; source markers in `definition` become plain text.
    pub fn view(&mut self, name: &str, mut definition: Value) -> Result<()> {
        serialize_sources(&mut definition);
        self.section_mut(VIEWS)?.insert(name.to_string(), definition);
        Ok(())
    }

    /// Replace all views at once; source markers become plain text.
    pub fn set_views(&mut self, mut views: Value) -> Result<()> {
        if !views.is_object() {
            return Err(CouchpackError::validation("views must be a JSON object"));
        }
        serialize_sources(&mut views);
        self.body.insert(VIEWS.to_string(), views);
        Ok(())
    }

    pub fn list(&mut self, name: &str, source: impl Into<Source>) -> Result<()> {
        let text = source.into().into_string();
        self.section_mut(LISTS)?
            .insert(name.to_string(), Value::String(text));
        Ok(())
    }

    pub fn show(&mut self, name: &str, source: impl Into<Source>) -> Result<()> {
        let text = source.into().into_string();
        self.section_mut(SHOWS)?
            .insert(name.to_string(), Value::String(text));
        Ok(())
    }

    pub fn schema(&mut self, name: &str, schema: Value) -> Result<()> {
        self.section_mut(SCHEMAS)?.insert(name.to_string(), schema);
        Ok(())
    }

    /// Set `validate_doc_update`.
    pub fn validation(&mut self, source: impl Into<Source>) {
        let text = source.into().into_string();
        self.body
            .insert(VALIDATE_DOC_UPDATE.to_string(), Value::String(text));
    }

    /// Append a rewrite rule.
    pub fn rewrite(&mut self, rule: Value) -> Result<()> {
        let rewrites = self
            .body
            .entry(REWRITES)
            .or_insert_with(|| Value::Array(Vec::new()));
        match rewrites {
            Value::Array(rules) => {
                rules.push(rule);
                Ok(())
            }
            _ => Err(CouchpackError::conflict(REWRITES)),
        }
    }

    fn section_mut(&mut self, section: &str) -> Result<&mut Map<String, Value>> {
        self.body
            .entry(section)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| CouchpackError::conflict(section))
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load files into this document with the default loader, resolving
    /// paths against the current directory.
    pub fn load(
        &mut self,
        input: impl Into<LoadInput>,
        extra: Option<&Map<String, Value>>,
    ) -> Result<()> {
        default_loader().load(self, &input.into(), extra)
    }

    /// Load files with a specific loader, resolving paths against `root`.
    pub fn load_with(
        &mut self,
        loader: &Loader,
        root: &Path,
        input: impl Into<LoadInput>,
        extra: Option<&Map<String, Value>>,
    ) -> Result<()> {
        loader.load_in(root, self, &input.into(), extra)
    }

    // -----------------------------------------------------------------------
    // Revision tracking
    // -----------------------------------------------------------------------

    /// Where this document is stored under `dir` (`<dir>/<name>.json`).
    pub fn filepath(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.name()))
    }

    /// Pick up `_rev` from a previously written copy under `dir`, if any.
    pub fn revision(&mut self, dir: &Path) -> Result<Option<&str>> {
        let file = self.filepath(dir);
        if file.is_file() {
            self.read(&file, Some(&["_rev"][..]))?;
        }
        Ok(self.rev())
    }
}

impl Accumulator for DesignDoc {
    fn tree_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.body
    }

    fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }

    fn is_reserved(&self, key: &str) -> bool {
        RESERVED.contains(&key)
    }

    /// Reserved leaves update the real fields so `filepath` follows `_id`.
    fn insert_entry(&mut self, key: String, value: Value) -> Result<()> {
        if !self.is_reserved(&key) {
            self.body.insert(key, value);
            return Ok(());
        }
        // Text files end with a newline.
        let value = match value {
            Value::String(text) => Value::String(text.trim().to_string()),
            other => other,
        };
        self.set_property(&key, value)
    }
}

impl Document for DesignDoc {
    fn doc_schema(&self) -> &'static DocSchema {
        &DESIGN_DOC_SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_property(&mut self, key: &str, value: Value) -> Result<()> {
        match key {
            "_id" => {
                self.id = value
                    .as_str()
                    .ok_or_else(|| CouchpackError::validation("_id must be a string"))?
                    .to_string();
            }
            "_rev" => {
                self.rev = value.as_str().map(str::to_string);
            }
            "_attachments" => {
                self.attachments = serde_json::from_value(value)?;
            }
            _ => {
                self.body.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    fn to_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        serialize_sources(&mut value);
        Ok(value)
    }
}
