//! Shared types, error model, and configuration for couchpack.
//!
//! This crate is the foundation depended on by all other couchpack crates.
//! It provides:
//! - [`CouchpackError`], the unified error type
//! - Wire types shared by the loader and the document model
//!   ([`AttachmentRecord`], [`Attachments`])
//! - Project configuration ([`ProjectConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, DdocEntry, DefaultsConfig, ProjectConfig, init_config, load_config,
    load_config_from, resolve_config_path, user_config_path,
};
pub use error::{BoxError, CouchpackError, Result};
pub use types::{AttachmentRecord, Attachments};
