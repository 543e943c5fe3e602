//! The load orchestrator: expand, walk, dispatch.
//!
//! Paths are resolved against the absolute `base` computed by the expander,
//! so a load never touches the process's working directory and concurrent
//! callers cannot disturb each other's path resolution.

use std::path::Path;
use std::sync::LazyLock;

use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use couchpack_shared::Result;

use crate::assemblers::{Accumulator, assemble};
use crate::filters::FilterRegistry;
use crate::options::{LoadInput, LoadOptions, expand, expand_in};
use crate::walker::walk;

static DEFAULT_LOADER: LazyLock<Loader> = LazyLock::new(Loader::default);

/// Process-wide loader with the built-in filters. Read-only; hosts that need
/// extra filters build their own [`Loader`].
pub fn default_loader() -> &'static Loader {
    &DEFAULT_LOADER
}

/// Loads directory trees into an [`Accumulator`] using a filter registry.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    filters: FilterRegistry,
}

impl Loader {
    /// Create a loader with a specific filter registry.
    pub fn new(filters: FilterRegistry) -> Self {
        Self { filters }
    }

    /// Registered filters.
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Registered filters, for adding or removing entries.
    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    /// Load `input`, resolved against the current directory, into `target`.
    pub fn load(
        &self,
        target: &mut dyn Accumulator,
        input: &LoadInput,
        extra: Option<&Map<String, Value>>,
    ) -> Result<()> {
        self.load_options(target, &expand(input, extra))
    }

    /// Load `input`, resolved against `root`, into `target`.
    pub fn load_in(
        &self,
        root: &Path,
        target: &mut dyn Accumulator,
        input: &LoadInput,
        extra: Option<&Map<String, Value>>,
    ) -> Result<()> {
        self.load_options(target, &expand_in(root, input, extra))
    }

    /// Walk `options.scan_path` under `options.base` and assemble every file.
    ///
    /// Stops at the first failing file. Entries assembled before the failure
    /// stay in `target`.
    #[instrument(skip_all, fields(kind = %options.kind, base = %options.base.display(), scan = %options.scan_path.display()))]
    pub fn load_options(&self, target: &mut dyn Accumulator, options: &LoadOptions) -> Result<()> {
        let outcome = walk(&options.base, &options.scan_path).and_then(|files| {
            for file in &files {
                assemble(target, file, options, &self.filters)?;
            }
            Ok(files.len())
        });

        match outcome {
            Ok(count) => {
                info!(files = count, "load complete");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, ?options, "load failed");
                Err(err)
            }
        }
    }
}
