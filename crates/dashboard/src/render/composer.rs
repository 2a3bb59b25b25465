//! Per-request template composition.
//!
//! A [`RenderUnit`] is assembled from a fixed sequence of fragments: the root
//! definition, the layout partials, the script partials, and finally the
//! requested page under the name [`CONTENT`]. Registration order matters
//! only when two fragments share a name; the later one wins.
//!
//! A fragment that cannot be loaded or parsed is logged and skipped. The
//! failures are recorded on the unit so the caller can apply its
//! [`RenderPolicy`].

use std::io::Write;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Value};
use thiserror::Error;
use tracing::{error, warn};

use super::assets::AssetStore;
use super::helpers::HelperContext;

/// Name of the root template executed for every page.
pub const ROOT: &str = "main";

/// Name the requested page fragment is registered under.
pub const CONTENT: &str = "content";

/// Root definition: hands control to the base layout.
pub const ROOT_SOURCE: &str = r#"{% include "base.html" %}"#;

/// Layout partials, in registration order.
pub const LAYOUT_PARTIALS: &[&str] = &[
    "base.html",
    "head.html",
    "nav.html",
    "footer.html",
    "scripts.html",
    "form_service.html",
    "form_notifier.html",
    "form_user.html",
    "form_checkin.html",
    "form_message.html",
];

/// Script partials, in registration order.
pub const SCRIPT_PARTIALS: &[&str] = &["charts.js", "chart_index.js"];

/// What to do when a fragment fails to load or parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderPolicy {
    /// Log the failure and render with whatever did parse.
    #[default]
    BestEffort,
    /// Fail the request.
    Strict,
}

/// A fragment that did not make it into the unit.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("failed to load {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Errors from executing a composed unit.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template execution failed: {0}")]
    Execute(#[from] minijinja::Error),
}

/// Builds render units from two asset boxes.
#[derive(Clone)]
pub struct Composer {
    templates: Arc<dyn AssetStore>,
    scripts: Arc<dyn AssetStore>,
}

impl Composer {
    pub fn new(templates: Arc<dyn AssetStore>, scripts: Arc<dyn AssetStore>) -> Self {
        Self { templates, scripts }
    }

    /// Compose the unit for `page`, bound to `helpers`.
    pub fn compose(&self, page: &str, helpers: &HelperContext) -> RenderUnit {
        let mut unit = RenderUnit::new(ROOT);
        helpers.register(&mut unit.env);

        unit.add(ROOT, ROOT_SOURCE.to_owned());
        for name in LAYOUT_PARTIALS {
            unit.load(self.templates.as_ref(), name, name);
        }
        for name in SCRIPT_PARTIALS {
            unit.load(self.scripts.as_ref(), name, name);
        }
        unit.load(self.templates.as_ref(), page, CONTENT);
        unit
    }

    /// Compose a unit holding only the script `file`, bound to the reduced
    /// script helper table.
    pub fn compose_script(&self, file: &str, helpers: &HelperContext) -> RenderUnit {
        let mut unit = RenderUnit::new(file);
        helpers.register_script(&mut unit.env);
        unit.load(self.scripts.as_ref(), file, file);
        unit
    }
}

/// One request's composed template set. Never shared between requests.
pub struct RenderUnit {
    env: Environment<'static>,
    entry: String,
    failures: Vec<FragmentError>,
}

impl RenderUnit {
    fn new(entry: &str) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|name: &str| {
            if name.ends_with(".js") {
                AutoEscape::None
            } else {
                AutoEscape::Html
            }
        });
        Self {
            env,
            entry: entry.to_owned(),
            failures: Vec::new(),
        }
    }

    fn load(&mut self, store: &dyn AssetStore, file: &str, name: &str) {
        match store.string(file) {
            Ok(source) => self.add(name, source),
            Err(e) => {
                warn!(fragment = file, error = %e, "template fragment unavailable");
                self.failures.push(FragmentError::Load {
                    name: file.to_owned(),
                    reason: e.to_string(),
                });
            }
        }
    }

    fn add(&mut self, name: &str, source: String) {
        if let Err(e) = self.env.add_template_owned(name.to_owned(), source) {
            error!(fragment = name, error = %e, "template fragment failed to parse");
            self.failures.push(FragmentError::Parse {
                name: name.to_owned(),
                source: e,
            });
        }
    }

    /// Fragments that failed to load or parse, in composition order.
    pub fn failures(&self) -> &[FragmentError] {
        &self.failures
    }

    /// Execute the entry template against `data`, writing into `out`.
    ///
    /// Output produced before an execution error stays in `out`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Execute`] if the entry template is missing or
    /// execution fails part way.
    pub fn execute<W: Write>(&self, data: &Value, out: W) -> Result<(), RenderError> {
        let template = self.env.get_template(&self.entry)?;
        template.render_to_write(data, out)?;
        Ok(())
    }
}
