//! Project configuration for couchpack.
//!
//! Project config lives at `./couchpack.toml`, with a per-user fallback at
//! `~/.couchpack/couchpack.toml`. CLI flags override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CouchpackError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "couchpack.toml";

/// Per-user config directory name under the home directory.
const USER_CONFIG_DIR_NAME: &str = ".couchpack";

// ---------------------------------------------------------------------------
// Config structs (matching couchpack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Template variables handed to content filters.
    #[serde(default)]
    pub locals: Map<String, Value>,

    /// Explicitly registered design documents. When empty, every directory
    /// under `defaults.ddoc_dir` is treated as one.
    #[serde(default)]
    pub ddocs: Vec<DdocEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Where built design documents are written, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory holding one sub-directory per design document.
    #[serde(default = "default_ddoc_dir")]
    pub ddoc_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ddoc_dir: default_ddoc_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "data/ddocs".into()
}
fn default_ddoc_dir() -> String {
    "ddocs".into()
}

/// `[[ddocs]]` entry: one design document and how to load it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdocEntry {
    /// Design document name (`_design/<name>`).
    pub name: String,
    /// Source directory, relative to the project root.
    pub path: String,
    /// Tagged load requests such as `{ modules = "views" }`, resolved against
    /// `path`. When empty the conventional layout is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loads: Vec<Map<String, Value>>,
}

impl ProjectConfig {
    /// Find a registered design document by name.
    pub fn ddoc(&self, name: &str) -> Option<&DdocEntry> {
        self.ddocs.iter().find(|entry| entry.name == name)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the per-user fallback config (`~/.couchpack/couchpack.toml`).
pub fn user_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CouchpackError::config("could not determine home directory"))?;
    Ok(home.join(USER_CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Pick the config file to use: an explicit path wins, then the project file
/// under `root`, then the per-user file. `None` means "use defaults".
pub fn resolve_config_path(explicit: Option<&Path>, root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = root.join(CONFIG_FILE_NAME);
    if project.is_file() {
        return Some(project);
    }

    user_config_path().ok().filter(|path| path.is_file())
}

/// Load the project config. Returns defaults if no config file exists.
pub fn load_config(explicit: Option<&Path>, root: &Path) -> Result<ProjectConfig> {
    match resolve_config_path(explicit, root) {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!(root = %root.display(), "config file not found, using defaults");
            Ok(ProjectConfig::default())
        }
    }
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CouchpackError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CouchpackError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into `root`. Refuses to overwrite.
/// Returns the path to the created file.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(CouchpackError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&ProjectConfig::default())
        .map_err(|e| CouchpackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CouchpackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
