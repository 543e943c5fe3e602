//! Per-kind assemblers: turn one walked file into a mutation of the target.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use couchpack_shared::{AttachmentRecord, Attachments, CouchpackError, Result};

use crate::filters::FilterRegistry;
use crate::options::{LoadKind, LoadOptions};
use crate::walker::segments;

/// Anything a load can populate.
///
/// Tree kinds (`files`, `modules`, `json`) write into [`Self::tree_mut`];
/// attachment loads write into [`Self::attachments_mut`].
pub trait Accumulator {
    /// Top-level object whose keys become the first path segments.
    fn tree_mut(&mut self) -> &mut Map<String, Value>;

    /// Flat attachment map.
    fn attachments_mut(&mut self) -> &mut Attachments;

    /// Top-level keys that tree loads may set as a whole but never nest under.
    fn is_reserved(&self, _key: &str) -> bool {
        false
    }

    /// Store a leaf that sits directly at the top of the tree.
    fn insert_entry(&mut self, key: String, value: Value) -> Result<()> {
        self.tree_mut().insert(key, value);
        Ok(())
    }
}

/// A standalone accumulator: a nested object graph plus attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bundle {
    #[serde(flatten)]
    pub tree: Map<String, Value>,
    #[serde(rename = "_attachments", skip_serializing_if = "Attachments::is_empty")]
    pub attachments: Attachments,
}

impl Bundle {
    /// Look up a nested value by `/`-separated key path.
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        let mut parts = key_path.split('/').filter(|part| !part.is_empty());
        let mut current = self.tree.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl Accumulator for Bundle {
    fn tree_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.tree
    }

    fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }
}

/// Dispatch one walked file to the assembler for `options.kind`.
pub fn assemble(
    target: &mut dyn Accumulator,
    file: &Path,
    options: &LoadOptions,
    filters: &FilterRegistry,
) -> Result<()> {
    match options.kind {
        LoadKind::Files | LoadKind::Modules => assemble_text(target, file, options, filters),
        LoadKind::Json => assemble_json(target, file, options),
        LoadKind::Attachments => assemble_attachment(target, file, options, filters),
    }
}

/// `files` and `modules`: nested text leaves, filtered by source extension.
fn assemble_text(
    target: &mut dyn Accumulator,
    file: &Path,
    options: &LoadOptions,
    filters: &FilterRegistry,
) -> Result<()> {
    let bytes = read(options, file)?;
    let mut content = String::from_utf8_lossy(&bytes).into_owned();

    if let Some(extension) = extension_of(file) {
        if let Some(filter) = filters.get(&extension) {
            content = filter(&content, options)
                .map_err(|err| CouchpackError::filter(options.resolve(file), extension, err))?;
        }
    }

    let (parents, name) = split_leaf(file)?;
    let leaf = match options.kind {
        LoadKind::Modules => strip_extension(&name),
        _ => name,
    };

    debug!(file = %file.display(), key = %leaf, "assembled text leaf");
    store(target, &parents, leaf, Value::String(content))
}

/// `json`: parse the file and store the structure under its stem.
fn assemble_json(target: &mut dyn Accumulator, file: &Path, options: &LoadOptions) -> Result<()> {
    let bytes = read(options, file)?;
    let parsed: Value = serde_json::from_slice(&bytes)
        .map_err(|err| CouchpackError::parse(options.resolve(file), err.to_string()))?;

    let (parents, name) = split_leaf(file)?;
    let leaf = strip_extension(&name);

    debug!(file = %file.display(), key = %leaf, "assembled json leaf");
    store(target, &parents, leaf, parsed)
}

/// `attachments`: flat entry keyed by relative path, base64 payload.
fn assemble_attachment(
    target: &mut dyn Accumulator,
    file: &Path,
    options: &LoadOptions,
    filters: &FilterRegistry,
) -> Result<()> {
    let mut data = read(options, file)?;
    let mut stored: PathBuf = segments(file).iter().collect();

    if let Some(extension) = extension_of(file) {
        if let Some(new_extension) = filters.stored_extension(&extension) {
            stored.set_extension(new_extension);
        }
        if let Some(filter) = filters.get(&extension) {
            let text = String::from_utf8_lossy(&data).into_owned();
            let filtered = filter(&text, options).map_err(|err| {
                CouchpackError::filter(options.resolve(file), extension.clone(), err)
            })?;
            // An empty result keeps the original bytes.
            if !filtered.is_empty() {
                data = filtered.into_bytes();
            }
        }
    }

    let key = segments(&stored).join("/");
    let content_type = mime_guess::from_path(&stored)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    debug!(file = %file.display(), key = %key, %content_type, bytes = data.len(), "assembled attachment");
    target.attachments_mut().insert(
        key,
        AttachmentRecord {
            content_type,
            data: STANDARD.encode(&data),
        },
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read(options: &LoadOptions, file: &Path) -> Result<Vec<u8>> {
    let path = options.resolve(file);
    std::fs::read(&path).map_err(|e| CouchpackError::io(&path, e))
}

fn extension_of(file: &Path) -> Option<String> {
    file.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
}

/// Split a relative path into parent segments and the final file name.
fn split_leaf(file: &Path) -> Result<(Vec<String>, String)> {
    let mut parts = segments(file);
    let name = parts
        .pop()
        .ok_or_else(|| CouchpackError::validation(format!("empty file path {file:?}")))?;
    Ok((parts, name))
}

fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Route a tree leaf: top-level leaves go through the accumulator, deeper
/// ones are nested unless their first segment is reserved.
fn store(
    target: &mut dyn Accumulator,
    parents: &[String],
    leaf: String,
    value: Value,
) -> Result<()> {
    match parents.first() {
        None => target.insert_entry(leaf, value),
        Some(top) if target.is_reserved(top) => Err(CouchpackError::conflict(top.clone())),
        Some(_) => insert_nested(target.tree_mut(), parents, leaf, value),
    }
}

/// Descend through `parents`, creating objects as needed, and set `leaf`.
///
/// A missing or `null` intermediate becomes `{}`; any other non-object value
/// is a conflict.
fn insert_nested(
    tree: &mut Map<String, Value>,
    parents: &[String],
    leaf: String,
    value: Value,
) -> Result<()> {
    let mut node = tree;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = node.entry(segment.clone()).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        node = entry
            .as_object_mut()
            .ok_or_else(|| CouchpackError::conflict(parents[..=depth].join(".")))?;
    }
    node.insert(leaf, value);
    Ok(())
}
