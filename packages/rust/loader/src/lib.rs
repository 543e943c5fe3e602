//! Directory-tree loader for couchpack.
//!
//! Turns a directory of heterogeneous files into entries of a nested object
//! graph or a map of base64 attachments:
//! - [`expand`] normalizes caller shorthand into [`LoadOptions`]
//! - [`walk`] lists the files beneath the scan path
//! - [`FilterRegistry`] transforms file contents by extension
//! - [`assemble`] applies the per-kind storage rule to one file
//! - [`Loader`] ties the steps together for an [`Accumulator`]

pub mod assemblers;
pub mod filters;
pub mod loader;
pub mod options;
pub mod walker;

pub use assemblers::{Accumulator, Bundle, assemble};
pub use filters::{FilterFn, FilterRegistry, compile_scss, render_template};
pub use loader::{Loader, default_loader};
pub use options::{ATTACHMENTS_DIR, LoadInput, LoadKind, LoadOptions, expand, expand_in};
pub use walker::{segments, walk};
