//! Content filters keyed by file extension.
//!
//! A filter turns a file's text into derived text before it is stored
//! (a template into markup, a stylesheet source into CSS). Alongside each
//! filter the registry can record the extension the stored key should carry,
//! so `index.jinja` is attached as `index.html`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use couchpack_shared::BoxError;

use crate::options::LoadOptions;

/// A synchronous text transform: `(content, options) -> content`.
pub type FilterFn = dyn Fn(&str, &LoadOptions) -> Result<String, BoxError> + Send + Sync;

/// Extension-keyed filters plus the stored-extension substitutions.
///
/// Extensions are stored without the leading dot; lookups accept either form.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<FilterFn>>,
    extensions: BTreeMap<String, String>,
}

impl Default for FilterRegistry {
    /// Registry with the built-in `.jinja` → `.html` and `.scss` → `.css`
    /// filters.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("jinja", Some("html"), render_template)
            .register("scss", Some("css"), compile_scss);
        registry
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl FilterRegistry {
    /// A registry with no filters; every file is stored verbatim.
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Register `filter` for `extension`, optionally renaming stored keys to
    /// `stored_extension`. Replaces any previous entry.
    pub fn register<F>(
        &mut self,
        extension: &str,
        stored_extension: Option<&str>,
        filter: F,
    ) -> &mut Self
    where
        F: Fn(&str, &LoadOptions) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        let key = normalize(extension);
        self.filters.insert(key.clone(), Arc::new(filter));
        match stored_extension {
            Some(target) => {
                self.extensions.insert(key, normalize(target));
            }
            None => {
                self.extensions.remove(&key);
            }
        }
        self
    }

    /// Set only the stored-extension substitution for `extension`.
    pub fn map_extension(&mut self, extension: &str, stored_extension: &str) -> &mut Self {
        self.extensions
            .insert(normalize(extension), normalize(stored_extension));
        self
    }

    /// Drop the filter and substitution for `extension`.
    pub fn remove(&mut self, extension: &str) -> &mut Self {
        let key = normalize(extension);
        self.filters.remove(&key);
        self.extensions.remove(&key);
        self
    }

    /// The filter registered for `extension`, if any.
    pub fn get(&self, extension: &str) -> Option<&FilterFn> {
        self.filters
            .get(normalize(extension).as_str())
            .map(|filter| &**filter)
    }

    /// The extension stored keys should carry in place of `extension`.
    pub fn stored_extension(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(normalize(extension).as_str())
            .map(String::as_str)
    }

    /// Extensions that currently have a filter.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Built-in filters
// ---------------------------------------------------------------------------

/// Render a Jinja-style template with `options.locals` as its context.
pub fn render_template(source: &str, options: &LoadOptions) -> Result<String, BoxError> {
    let env = minijinja::Environment::new();
    Ok(env.render_str(source, &options.locals)?)
}

/// Compile SCSS to CSS, resolving `@import` against the load base.
pub fn compile_scss(source: &str, options: &LoadOptions) -> Result<String, BoxError> {
    let scss_options = grass::Options::default().load_path(&options.base);
    grass::from_string(source.to_owned(), &scss_options).map_err(|err| err.to_string().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{LoadInput, expand_in};
    use serde_json::json;
    use std::path::Path;

    fn options_with_locals(locals: serde_json::Value) -> LoadOptions {
        let mut options = expand_in(Path::new("/project"), &LoadInput::from("views"), None);
        if let serde_json::Value::Object(map) = locals {
            options.locals = map;
        }
        options
    }

    #[test]
    fn default_registry_has_builtins() {
        let registry = FilterRegistry::default();
        assert!(registry.get(".jinja").is_some());
        assert!(registry.get("scss").is_some());
        assert_eq!(registry.stored_extension(".jinja"), Some("html"));
        assert_eq!(registry.stored_extension("scss"), Some("css"));
        assert!(registry.get("js").is_none());
    }

    #[test]
    fn register_and_remove() {
        let mut registry = FilterRegistry::empty();
        registry.register(".tmpl", Some(".txt"), |content, _| Ok(content.to_uppercase()));

        let options = options_with_locals(json!({}));
        let filter = registry.get("tmpl").unwrap();
        assert_eq!(filter("hi", &options).unwrap(), "HI");
        assert_eq!(registry.stored_extension("TMPL"), Some("txt"));

        registry.remove("tmpl");
        assert!(registry.get("tmpl").is_none());
        assert!(registry.stored_extension("tmpl").is_none());
    }

    #[test]
    fn extension_mapping_without_filter() {
        let mut registry = FilterRegistry::default();
        registry.map_extension(".MD", "txt");

        assert_eq!(registry.stored_extension("md"), Some("txt"));
        assert!(registry.get("md").is_none());
        assert_eq!(registry.extensions().collect::<Vec<_>>(), ["jinja", "scss"]);

        registry.remove("scss");
        assert_eq!(registry.extensions().collect::<Vec<_>>(), ["jinja"]);
    }

    #[test]
    fn renders_template_with_locals() {
        let options = options_with_locals(json!({ "foo": "bar" }));
        let html = render_template("<!DOCTYPE html><html><p>{{ foo }}</p></html>", &options).unwrap();
        assert_eq!(html, "<!DOCTYPE html><html><p>bar</p></html>");
    }

    #[test]
    fn template_syntax_error_is_reported() {
        let options = options_with_locals(json!({}));
        assert!(render_template("{% if %}", &options).is_err());
    }

    #[test]
    fn compiles_scss_to_css() {
        let options = options_with_locals(json!({}));
        let css = compile_scss("$size: 12px;\nbody { font: $size Helvetica; }", &options).unwrap();
        assert!(css.contains('{'));
        assert!(css.contains(':'));
        assert!(css.contains(';'));
        assert!(css.contains("12px"));
    }
}
