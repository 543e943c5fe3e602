//! Recursive directory walk producing base-relative file paths.

use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use couchpack_shared::{CouchpackError, Result};

/// List every regular file under `base/scan_path`, depth-first.
///
/// Paths are returned relative to `base`, so the first segment of each is
/// the scanned directory's own name (unless `scan_path` is `.`). Entries are
/// visited in file-name order, which keeps repeated walks of an unchanged
/// tree identical. Directories are descended into but never returned; a
/// `scan_path` naming a plain file yields just that file.
pub fn walk(base: &Path, scan_path: &Path) -> Result<Vec<PathBuf>> {
    let start = if is_current_dir(scan_path) {
        base.to_path_buf()
    } else {
        base.join(scan_path)
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&start).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(&start, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        files.push(relative_to(base, entry.path()));
    }

    Ok(files)
}

/// Split a relative path into its name segments, dropping `.` components.
pub fn segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn is_current_dir(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::CurDir))
}

fn relative_to(base: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(base) {
        // `base` is itself the file (single-file attachment root).
        Ok(rel) if rel.as_os_str().is_empty() => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

fn walk_error(start: &Path, err: walkdir::Error) -> CouchpackError {
    let path = err.path().unwrap_or(start).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
    CouchpackError::io(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cp-walker-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_lists_files_relative_to_base() {
        let tmp = temp_dir();
        write(&tmp.join("path/to/file.ext"), "Content of file.ext");
        write(&tmp.join("path/a.txt"), "a");
        std::fs::create_dir_all(tmp.join("path/empty")).unwrap();

        let files = walk(&tmp, Path::new("path")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("path/a.txt"), PathBuf::from("path/to/file.ext")]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn walk_handles_plain_file() {
        let tmp = temp_dir();
        write(&tmp.join("some.json"), r#"{"foo":"bar"}"#);

        let files = walk(&tmp, Path::new("some.json")).unwrap();
        assert_eq!(files, vec![PathBuf::from("some.json")]);

        let files = walk(&tmp.join("some.json"), Path::new(".")).unwrap();
        assert_eq!(files, vec![PathBuf::from("some.json")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn walk_from_dot_keys_without_prefix() {
        let tmp = temp_dir();
        write(&tmp.join("index.html"), "<html></html>");
        write(&tmp.join("css/screen.css"), "body {}");

        let files = walk(&tmp, Path::new(".")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("css/screen.css"), PathBuf::from("index.html")]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn walk_is_repeatable() {
        let tmp = temp_dir();
        for name in ["b/2.js", "a/1.js", "c.js", "a/z/3.js"] {
            write(&tmp.join("lib").join(name), name);
        }

        let first = walk(&tmp, Path::new("lib")).unwrap();
        let second = walk(&tmp, Path::new("lib")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn walk_missing_path_is_io_error() {
        let tmp = temp_dir();
        let err = walk(&tmp, Path::new("nope")).unwrap_err();
        assert!(matches!(err, CouchpackError::Io { .. }));
        assert!(err.to_string().contains("nope"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn segments_skip_current_dir() {
        assert_eq!(segments(Path::new("./a/b/c.js")), vec!["a", "b", "c.js"]);
    }
}
