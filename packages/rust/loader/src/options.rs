//! Load kinds and the option expander.
//!
//! Callers describe a load with shorthand (a bare path, or a tagged object
//! such as `{"modules": "lib"}`) and [`expand`] turns it into a complete
//! [`LoadOptions`] with an absolute walk base.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use couchpack_shared::{CouchpackError, Result};

/// Directory name that selects an attachment load when given as a bare path.
pub const ATTACHMENTS_DIR: &str = "_attachments";

/// Key under which filter variables travel in a tagged object.
const LOCALS_KEY: &str = "locals";

/// Key that names a kind explicitly in an options object (`{"kind": "json"}`).
const KIND_KEY: &str = "kind";

// ---------------------------------------------------------------------------
// LoadKind
// ---------------------------------------------------------------------------

/// Which assembler a load dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadKind {
    /// Nested tree, leaves keyed by full file name, values as text.
    Files,
    /// Nested tree, leaves keyed by file stem, values as text.
    Modules,
    /// Nested tree, leaves keyed by file stem, values parsed as JSON.
    Json,
    /// Flat map of relative path to base64 attachment record.
    Attachments,
}

impl LoadKind {
    /// Fixed scan order used when inferring a kind from a tagged object.
    pub const TAG_ORDER: [LoadKind; 4] = [
        LoadKind::Attachments,
        LoadKind::Files,
        LoadKind::Modules,
        LoadKind::Json,
    ];

    /// The tag used for this kind in tagged objects and config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Modules => "modules",
            Self::Json => "json",
            Self::Attachments => "attachments",
        }
    }

    /// Look up a kind by its tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::TAG_ORDER.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// First kind (in [`Self::TAG_ORDER`]) whose tag is a key of `object`.
    pub fn infer(object: &Map<String, Value>) -> Option<Self> {
        Self::TAG_ORDER
            .into_iter()
            .find(|kind| object.contains_key(kind.as_str()))
    }
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadKind {
    type Err = CouchpackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| {
            CouchpackError::config(format!(
                "unknown load kind `{s}` (expected attachments, files, modules or json)"
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// LoadInput
// ---------------------------------------------------------------------------

/// Caller shorthand accepted by [`expand`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadInput {
    /// A bare path. Loads as `files`, or as `attachments` when the path is
    /// literally `_attachments`.
    Path(String),
    /// A tagged object whose kind key holds the path, e.g.
    /// `{"modules": "views", "locals": {"title": "Blog"}}`.
    Tagged(Map<String, Value>),
}

impl From<&str> for LoadInput {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for LoadInput {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for LoadInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_string_lossy().into_owned())
    }
}

impl From<Map<String, Value>> for LoadInput {
    fn from(object: Map<String, Value>) -> Self {
        Self::Tagged(object)
    }
}

impl LoadInput {
    /// Build a tagged input for one kind.
    pub fn tagged(kind: LoadKind, path: impl Into<String>) -> Self {
        let mut object = Map::new();
        object.insert(kind.as_str().to_string(), Value::String(path.into()));
        Self::Tagged(object)
    }
}

// ---------------------------------------------------------------------------
// LoadOptions
// ---------------------------------------------------------------------------

/// Fully expanded, immutable configuration for one load call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOptions {
    /// Selected assembler.
    pub kind: LoadKind,
    /// Directory the load was requested from.
    pub root: PathBuf,
    /// Absolute directory the walk's relative paths are resolved against.
    pub base: PathBuf,
    /// Path under `base` that bounds the walk.
    pub scan_path: PathBuf,
    /// Variables passed through to content filters.
    pub locals: Map<String, Value>,
}

impl LoadOptions {
    /// Absolute location of a walked path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.base.join(relative)
    }
}

/// Expand shorthand relative to the process's current directory.
///
/// Never fails: an unreadable current directory degrades to `.`.
pub fn expand(input: &LoadInput, extra: Option<&Map<String, Value>>) -> LoadOptions {
    let root = std::env::current_dir().unwrap_or_else(|err| {
        warn!(error = %err, "current directory unavailable, resolving against `.`");
        PathBuf::from(".")
    });
    expand_in(&root, input, extra)
}

/// Expand shorthand relative to an explicit `root`.
///
/// `extra` is a second options object that may carry a kind (as a tag key or
/// `"kind"`) and `locals`; its locals override those of a tagged input. An
/// explicit `"kind"` wins for both input forms; tag keys in `extra` only
/// apply to bare paths, since a tagged input names its own tag.
pub fn expand_in(
    root: &Path,
    input: &LoadInput,
    extra: Option<&Map<String, Value>>,
) -> LoadOptions {
    let (kind, path) = match input {
        LoadInput::Path(path) => (kind_for_path(path, extra), path.clone()),
        LoadInput::Tagged(object) => tagged_kind_and_path(object, extra),
    };

    let mut locals = Map::new();
    if let LoadInput::Tagged(object) = input {
        merge_locals(&mut locals, object);
    }
    if let Some(extra) = extra {
        merge_locals(&mut locals, extra);
    }

    let (base, scan_path) = split_scan_path(root, Path::new(&path), kind);

    LoadOptions {
        kind,
        root: root.to_path_buf(),
        base,
        scan_path,
        locals,
    }
}

/// Kind for a bare path: an explicit `kind`, then `_attachments`, then a tag
/// found in `extra`, then `files`.
fn kind_for_path(path: &str, extra: Option<&Map<String, Value>>) -> LoadKind {
    if let Some(kind) = extra.and_then(explicit_kind) {
        return kind;
    }
    if path == ATTACHMENTS_DIR {
        return LoadKind::Attachments;
    }
    extra.and_then(LoadKind::infer).unwrap_or(LoadKind::Files)
}

fn explicit_kind(object: &Map<String, Value>) -> Option<LoadKind> {
    let tag = object.get(KIND_KEY)?.as_str()?;
    let kind = LoadKind::from_tag(tag);
    if kind.is_none() {
        warn!(kind = tag, "unrecognized load kind, falling back to files");
    }
    Some(kind.unwrap_or(LoadKind::Files))
}

/// Kind and path for a tagged object: an explicit `kind` (on the object, then
/// in `extra`), then the first tag in [`LoadKind::TAG_ORDER`], then `files`.
/// The path is the value under the kind's tag, else the first other string.
fn tagged_kind_and_path(
    object: &Map<String, Value>,
    extra: Option<&Map<String, Value>>,
) -> (LoadKind, String) {
    let kind = explicit_kind(object)
        .or_else(|| extra.and_then(explicit_kind))
        .or_else(|| LoadKind::infer(object));

    let Some(kind) = kind else {
        warn!(
            keys = ?object.keys().collect::<Vec<_>>(),
            "no recognized load kind, falling back to files"
        );
        return (LoadKind::Files, first_path(object).unwrap_or(".").to_string());
    };

    let path = object
        .get(kind.as_str())
        .and_then(Value::as_str)
        .or_else(|| first_path(object))
        .unwrap_or(".")
        .to_string();
    (kind, path)
}

fn first_path(object: &Map<String, Value>) -> Option<&str> {
    object
        .iter()
        .filter(|(key, _)| key.as_str() != LOCALS_KEY && key.as_str() != KIND_KEY)
        .find_map(|(_, value)| value.as_str())
}

fn merge_locals(locals: &mut Map<String, Value>, object: &Map<String, Value>) {
    if let Some(Value::Object(vars)) = object.get(LOCALS_KEY) {
        for (key, value) in vars {
            locals.insert(key.clone(), value.clone());
        }
    }
}

/// Attachment loads walk the path itself (`scan_path = "."`); every other
/// kind walks from the parent so the directory name becomes the first key.
fn split_scan_path(root: &Path, path: &Path, kind: LoadKind) -> (PathBuf, PathBuf) {
    let current = PathBuf::from(".");
    if kind == LoadKind::Attachments {
        let dir = join_root(root, path);
        // A single-file attachment root walks from its parent.
        if !dir.is_file() {
            return (dir, current);
        }
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (join_root(root, parent), PathBuf::from(name)),
        (None, Some(name)) => (root.to_path_buf(), PathBuf::from(name)),
        // `.`, `..` and the like have no final segment to key on.
        (_, None) => (join_root(root, path), current),
    }
}

fn join_root(root: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path == Path::new(".") {
        root.to_path_buf()
    } else {
        root.join(path)
    }
}
