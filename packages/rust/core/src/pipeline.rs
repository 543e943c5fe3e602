//! End-to-end `build` pipeline: config → plan → load → validate → write.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use couchpack_loader::{ATTACHMENTS_DIR, LoadInput, LoadKind, Loader};
use couchpack_shared::{CouchpackError, DdocEntry, ProjectConfig, Result};

use crate::ddoc::DesignDoc;
use crate::document::Document;

const VALIDATION_FILE: &str = "validate_doc_update.js";
const REWRITES_FILE: &str = "rewrites.json";
const SCHEMAS_DIR: &str = "schemas";

/// Configuration for a `build` run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; config paths are relative to it.
    pub root: PathBuf,
    /// Loaded project config.
    pub project: ProjectConfig,
    /// Build only the named design document.
    pub only: Option<String>,
    /// Assemble and validate but write nothing.
    pub dry_run: bool,
}

/// Result of building one design document.
#[derive(Debug)]
pub struct BuildResult {
    /// Design document name.
    pub name: String,
    /// Number of attachments collected.
    pub attachment_count: usize,
    /// Where the document was written (`None` for dry runs).
    pub output_path: Option<PathBuf>,
    /// The assembled document.
    pub doc: DesignDoc,
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a design document starts building.
    fn started(&self, name: &str);
    /// Called when a design document is done.
    fn built(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _name: &str) {}
    fn built(&self, _result: &BuildResult) {}
}

/// One step of a design document's build plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Load a tree with the loader.
    Load(LoadInput),
    /// Read a file as the `validate_doc_update` function.
    Validation(PathBuf),
    /// Read a JSON array of rewrite rules.
    Rewrites(PathBuf),
}

// ---------------------------------------------------------------------------
// Entry resolution
// ---------------------------------------------------------------------------

/// Design documents to build: the configured `[[ddocs]]`, or every
/// sub-directory of `defaults.ddoc_dir` in name order. Narrowed by `only`.
pub fn resolve_entries(config: &BuildConfig) -> Result<Vec<DdocEntry>> {
    let entries = if config.project.ddocs.is_empty() {
        discover_entries(&config.root, &config.project.defaults.ddoc_dir)?
    } else {
        config.project.ddocs.clone()
    };

    match &config.only {
        None => Ok(entries),
        Some(name) => {
            let selected: Vec<DdocEntry> =
                entries.into_iter().filter(|entry| &entry.name == name).collect();
            if selected.is_empty() {
                return Err(CouchpackError::config(format!(
                    "unknown design document `{name}`"
                )));
            }
            Ok(selected)
        }
    }
}

fn discover_entries(root: &Path, ddoc_dir: &str) -> Result<Vec<DdocEntry>> {
    let dir = root.join(ddoc_dir);
    let reader = std::fs::read_dir(&dir).map_err(|e| CouchpackError::io(&dir, e))?;

    let mut names = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| CouchpackError::io(&dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| DdocEntry {
            path: Path::new(ddoc_dir).join(&name).to_string_lossy().into_owned(),
            name,
            loads: Vec::new(),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Build plan for a design document directory.
///
/// Configured loads are used as given. Without them, each immediate child of
/// `dir` is mapped by convention:
/// - `_attachments` (directory or single file) → attachments
/// - `validate_doc_update.js` → validation function
/// - `rewrites.json` → rewrite rules
/// - `schemas/` and `*.json` → json
/// - other directories → modules
/// - other files → files
pub fn plan(dir: &Path, loads: &[Map<String, Value>]) -> Result<Vec<PlanStep>> {
    if !loads.is_empty() {
        return Ok(loads
            .iter()
            .map(|load| PlanStep::Load(LoadInput::Tagged(load.clone())))
            .collect());
    }

    let reader = std::fs::read_dir(dir).map_err(|e| CouchpackError::io(dir, e))?;
    let mut children = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| CouchpackError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            children.push((name, entry.path().is_dir()));
        }
    }
    children.sort();

    Ok(children
        .into_iter()
        .map(|(name, is_dir)| conventional_step(dir, &name, is_dir))
        .collect())
}

fn conventional_step(dir: &Path, name: &str, is_dir: bool) -> PlanStep {
    match (name, is_dir) {
        (ATTACHMENTS_DIR, _) => PlanStep::Load(LoadInput::tagged(LoadKind::Attachments, name)),
        (VALIDATION_FILE, false) => PlanStep::Validation(dir.join(name)),
        (REWRITES_FILE, false) => PlanStep::Rewrites(dir.join(name)),
        (SCHEMAS_DIR, true) => PlanStep::Load(LoadInput::tagged(LoadKind::Json, name)),
        (_, true) => PlanStep::Load(LoadInput::tagged(LoadKind::Modules, name)),
        (_, false) if name.ends_with(".json") => {
            PlanStep::Load(LoadInput::tagged(LoadKind::Json, name))
        }
        (_, false) => PlanStep::Load(LoadInput::tagged(LoadKind::Files, name)),
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Build every selected design document.
#[instrument(skip_all, fields(root = %config.root.display(), dry_run = config.dry_run))]
pub fn build_all(
    config: &BuildConfig,
    loader: &Loader,
    progress: &dyn ProgressReporter,
) -> Result<Vec<BuildResult>> {
    let start = Instant::now();
    let entries = resolve_entries(config)?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in &entries {
        progress.started(&entry.name);
        let result = build_ddoc(config, entry, loader)?;
        progress.built(&result);
        results.push(result);
    }

    info!(
        ddocs = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "build complete"
    );
    Ok(results)
}

/// Assemble, validate, and (unless dry-running) write one design document.
#[instrument(skip_all, fields(name = %entry.name, path = %entry.path))]
pub fn build_ddoc(config: &BuildConfig, entry: &DdocEntry, loader: &Loader) -> Result<BuildResult> {
    let dir = config.root.join(&entry.path);
    let steps = plan(&dir, &entry.loads)?;
    debug!(steps = steps.len(), "planned design document");

    let mut extra = Map::new();
    extra.insert(
        "locals".to_string(),
        Value::Object(config.project.locals.clone()),
    );

    let mut doc = DesignDoc::new(&entry.name);
    for step in &steps {
        match step {
            PlanStep::Load(input) => doc.load_with(loader, &dir, input.clone(), Some(&extra))?,
            PlanStep::Validation(path) => {
                let source =
                    std::fs::read_to_string(path).map_err(|e| CouchpackError::io(path, e))?;
                doc.validation(source);
            }
            PlanStep::Rewrites(path) => {
                for rule in read_rewrites(path)? {
                    doc.rewrite(rule)?;
                }
            }
        }
    }

    let output_dir = config.root.join(&config.project.defaults.output_dir);
    doc.revision(&output_dir)?;
    doc.validate()?;

    let output_path = if config.dry_run {
        None
    } else {
        let path = doc.filepath(&output_dir);
        doc.write(&path)?;
        Some(path)
    };

    info!(
        id = %doc.id(),
        attachments = doc.attachments().len(),
        written = output_path.is_some(),
        "design document built"
    );

    Ok(BuildResult {
        name: entry.name.clone(),
        attachment_count: doc.attachments().len(),
        output_path,
        doc,
    })
}

fn read_rewrites(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read(path).map_err(|e| CouchpackError::io(path, e))?;
    match serde_json::from_slice(&content) {
        Ok(Value::Array(rules)) => Ok(rules),
        Ok(_) => Err(CouchpackError::parse(path, "rewrites must be a JSON array")),
        Err(e) => Err(CouchpackError::parse(path, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchpack_loader::default_loader;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cp-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn blog_project(root: &Path) {
        write(root, "ddocs/blog/views/recent/map.js", "function (doc) { emit(doc.date); }");
        write(root, "ddocs/blog/lists/index.js", "function (head, req) {}");
        write(root, "ddocs/blog/schemas/post.json", r#"{"type":"object"}"#);
        write(root, "ddocs/blog/_attachments/index.jinja", "<h1>{{ title }}</h1>");
        write(root, "ddocs/blog/validate_doc_update.js", "function (doc) {}");
        write(root, "ddocs/blog/rewrites.json", r#"[{"from":"/","to":"index.html"}]"#);
        write(root, "ddocs/blog/options.json", r#"{"local_seq":true}"#);
        write(root, "ddocs/admin/shows/user.js", "function (doc, req) {}");
    }

    fn config(root: &Path) -> BuildConfig {
        let mut project = ProjectConfig::default();
        project
            .locals
            .insert("title".to_string(), json!("Hello"));
        BuildConfig {
            root: root.to_path_buf(),
            project,
            only: None,
            dry_run: false,
        }
    }

    #[test]
    fn discovers_ddocs_in_name_order() {
        let tmp = temp_dir();
        blog_project(&tmp);

        let entries = resolve_entries(&config(&tmp)).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["admin", "blog"]);
        assert!(entries[1].path.ends_with("blog"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn only_unknown_ddoc_is_config_error() {
        let tmp = temp_dir();
        blog_project(&tmp);

        let mut cfg = config(&tmp);
        cfg.only = Some("missing".into());
        let err = resolve_entries(&cfg).unwrap_err();
        assert!(matches!(err, CouchpackError::Config { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn conventional_plan() {
        let tmp = temp_dir();
        blog_project(&tmp);
        let dir = tmp.join("ddocs/blog");

        let steps = plan(&dir, &[]).unwrap();
        assert_eq!(
            steps,
            vec![
                PlanStep::Load(LoadInput::tagged(LoadKind::Attachments, "_attachments")),
                PlanStep::Load(LoadInput::tagged(LoadKind::Modules, "lists")),
                PlanStep::Load(LoadInput::tagged(LoadKind::Json, "options.json")),
                PlanStep::Rewrites(dir.join("rewrites.json")),
                PlanStep::Load(LoadInput::tagged(LoadKind::Json, "schemas")),
                PlanStep::Validation(dir.join("validate_doc_update.js")),
                PlanStep::Load(LoadInput::tagged(LoadKind::Modules, "views")),
            ]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn builds_and_writes_design_documents() {
        let tmp = temp_dir();
        blog_project(&tmp);

        let results = build_all(&config(&tmp), default_loader(), &SilentProgress).unwrap();
        assert_eq!(results.len(), 2);

        let blog = &results[1];
        assert_eq!(blog.name, "blog");
        assert_eq!(blog.attachment_count, 1);
        let path = blog.output_path.as_ref().unwrap();
        assert_eq!(path, &tmp.join("data/ddocs/blog.json"));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["_id"], "_design/blog");
        assert_eq!(
            written["views"]["recent"]["map"],
            "function (doc) { emit(doc.date); }"
        );
        assert_eq!(written["lists"]["index"], "function (head, req) {}");
        assert_eq!(written["schemas"]["post"], json!({ "type": "object" }));
        assert_eq!(written["options"], json!({ "local_seq": true }));
        assert_eq!(written["validate_doc_update"], "function (doc) {}");
        assert_eq!(written["rewrites"][0]["to"], "index.html");
        assert_eq!(written["_attachments"]["index.html"]["data"], "PGgxPkhlbGxvPC9oMT4=");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = temp_dir();
        blog_project(&tmp);

        let mut cfg = config(&tmp);
        cfg.dry_run = true;
        cfg.only = Some("admin".into());
        let results = build_all(&cfg, default_loader(), &SilentProgress).unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].output_path.is_none());
        assert_eq!(
            results[0].doc.shows().unwrap()["user"],
            "function (doc, req) {}"
        );
        assert!(!tmp.join("data").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rebuild_keeps_stored_revision() {
        let tmp = temp_dir();
        blog_project(&tmp);
        write(
            &tmp,
            "data/ddocs/admin.json",
            r#"{"_id":"_design/admin","_rev":"3-abc"}"#,
        );

        let mut cfg = config(&tmp);
        cfg.only = Some("admin".into());
        let results = build_all(&cfg, default_loader(), &SilentProgress).unwrap();
        assert_eq!(results[0].doc.rev(), Some("3-abc"));

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.join("data/ddocs/admin.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written["_rev"], "3-abc");
        assert_eq!(written["shows"]["user"], "function (doc, req) {}");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn configured_loads_replace_conventions() {
        let tmp = temp_dir();
        write(&tmp, "src/app/lib/util.js", "exports.x = 1;");
        write(&tmp, "src/app/views/all/map.js", "function (doc) {}");

        let mut cfg = config(&tmp);
        cfg.project.ddocs.push(DdocEntry {
            name: "app".into(),
            path: "src/app".into(),
            loads: vec![json!({ "modules": "lib" }).as_object().unwrap().clone()],
        });

        let results = build_all(&cfg, default_loader(), &SilentProgress).unwrap();
        let doc = &results[0].doc;
        assert_eq!(doc.get("lib").unwrap()["util"], "exports.x = 1;");
        assert!(doc.views().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rewrites_must_be_an_array() {
        let tmp = temp_dir();
        write(&tmp, "ddocs/bad/rewrites.json", r#"{"from":"/"}"#);

        let err = build_all(&config(&tmp), default_loader(), &SilentProgress).unwrap_err();
        assert!(matches!(err, CouchpackError::Parse { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn single_file_attachment_root() {
        let tmp = temp_dir();
        write(&tmp, "ddocs/site/_attachments", "<html></html>");
        let dir = tmp.join("ddocs/site");

        assert_eq!(
            plan(&dir, &[]).unwrap(),
            vec![PlanStep::Load(LoadInput::tagged(LoadKind::Attachments, "_attachments"))]
        );

        let results = build_all(&config(&tmp), default_loader(), &SilentProgress).unwrap();
        let doc = &results[0].doc;
        assert_eq!(results[0].attachment_count, 1);
        assert_eq!(doc.attachments()["_attachments"].data, "PGh0bWw+PC9odG1sPg==");
        assert!(doc.get("_attachments").is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn id_file_moves_output_path_with_id() {
        let tmp = temp_dir();
        blog_project(&tmp);
        write(&tmp, "ddocs/blog/_id", "_design/other");

        let mut cfg = config(&tmp);
        cfg.only = Some("blog".into());
        let results = build_all(&cfg, default_loader(), &SilentProgress).unwrap();

        let path = results[0].output_path.as_ref().unwrap();
        assert_eq!(path, &tmp.join("data/ddocs/other.json"));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["_id"], "_design/other");
        assert_eq!(results[0].doc.id(), "_design/other");
        assert!(!tmp.join("data/ddocs/blog.json").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
