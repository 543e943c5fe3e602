//! Design-document model and build pipeline for couchpack.
//!
//! This crate turns directory trees loaded by `couchpack-loader` into
//! CouchDB design documents:
//! - [`Source`] marks executable function text inside JSON values
//! - [`Document`] gives read/write/validate behavior over a static schema
//! - [`DesignDoc`] is the design document itself
//! - [`pipeline`] builds every configured design document end to end

pub mod ddoc;
pub mod document;
pub mod pipeline;
pub mod source;

pub use ddoc::{DESIGN_PREFIX, DesignDoc};
pub use document::{DocSchema, Document, JsonType, Property};
pub use pipeline::{
    BuildConfig, BuildResult, PlanStep, ProgressReporter, SilentProgress, build_all, build_ddoc,
    plan, resolve_entries,
};
pub use source::{SOURCE_TAG, Source, serialize_sources};
