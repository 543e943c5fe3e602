//! Error types for couchpack.
//!
//! Library crates use [`CouchpackError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Boxed error returned by host-supplied content filters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all couchpack operations.
#[derive(Debug, thiserror::Error)]
pub enum CouchpackError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error (walk, stat, read, write).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed structured data in a loaded file.
    #[error("parse error in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A registered content filter failed on a file.
    #[error("filter for `{extension}` failed on {path:?}: {source}")]
    Filter {
        path: PathBuf,
        extension: String,
        source: BoxError,
    },

    /// A nested key that must hold an object already holds something else.
    #[error("cannot nest under `{key}`: existing value is not an object")]
    Conflict { key: String },

    /// Document validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CouchpackError>;

impl CouchpackError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for a file.
    pub fn parse(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a filter failure with the file and extension it ran on.
    pub fn filter(path: impl Into<PathBuf>, extension: impl Into<String>, source: BoxError) -> Self {
        Self::Filter {
            path: path.into(),
            extension: extension.into(),
            source,
        }
    }

    /// Create a conflict error for a dotted key path.
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }
}

impl From<serde_json::Error> for CouchpackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CouchpackError::config("unknown ddoc `blog`");
        assert_eq!(err.to_string(), "config error: unknown ddoc `blog`");

        let err = CouchpackError::conflict("rewrites.home");
        assert!(err.to_string().contains("rewrites.home"));
    }

    #[test]
    fn filter_error_keeps_source_message() {
        let err = CouchpackError::filter("views/index.jinja", ".jinja", "unexpected end".into());
        let text = err.to_string();
        assert!(text.contains(".jinja"));
        assert!(text.contains("views/index.jinja"));
        assert!(text.contains("unexpected end"));
    }
}
