//! Run orchestration.
//!
//! [`JinjaFx::run`] loads the data, renders the template once per row and
//! routes every rendering into named outputs. Everything a run mutates
//! (counters, budget, globals, warnings, buffers) is built inside the call.

use std::sync::Arc;

use jinjafx_data::{Expander, RowStore};
use log::debug;
use minijinja::Value;

use crate::engine::{MiniJinjaEngine, TemplateEngine};
use crate::error::{FxError, Result};
use crate::functions::{JinjaFxObject, RunContext};
use crate::options::{RunOptions, Vars};
use crate::router::{Destination, OutputRouter, Outputs};

const TEMPLATE: &str = "template";
const OUTPUT_NAME: &str = "output";

/// Result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub outputs: Outputs,
    pub warnings: Vec<String>,
}

/// A template plus the options it runs with.
///
/// # Example
///
/// ```rust
/// use jinjafx_render::{JinjaFx, Vars};
///
/// let fx = JinjaFx::new("<output \"{{ host }}.cfg\">\nhostname {{ host }}\n</output>\n");
/// let run = fx.run(Some("host\nsw(1|2)\n"), &Vars::new()).unwrap();
///
/// assert_eq!(run.outputs.text("sw1.cfg").unwrap(), "hostname sw1\n");
/// assert_eq!(run.outputs.text("sw2.cfg").unwrap(), "hostname sw2\n");
/// ```
#[derive(Debug, Clone)]
pub struct JinjaFx {
    template: String,
    options: RunOptions,
}

impl JinjaFx {
    pub fn new(template: impl Into<String>) -> Self {
        Self::with_options(template, RunOptions::default())
    }

    pub fn with_options(template: impl Into<String>, options: RunOptions) -> Self {
        JinjaFx {
            template: template.into(),
            options,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Renders the template over `data` with `vars` as globals.
    ///
    /// Without data (or with blank data) the template renders once with
    /// `jinjafx.row == 0`. Any error aborts the whole run.
    pub fn run(&self, data: Option<&str>, vars: &Vars) -> Result<RunOutput> {
        let load = self.options.load_options(vars)?;
        let mut expander = match self.options.budget {
            Some(limit) => Expander::bounded(limit),
            None => Expander::unbounded(),
        };

        let store = match data {
            Some(text) if !text.trim().is_empty() => RowStore::load(text, &load, &mut expander)?,
            _ => RowStore::empty(),
        };
        let context = Arc::new(RunContext::new(store, expander));

        let mut engine = MiniJinjaEngine::with_options(&self.options);
        for (name, value) in vars.as_map() {
            engine.add_global(name.clone(), Value::from_serialize(value));
        }
        engine.add_global("jinjafx", Value::from_object(JinjaFxObject::new(Arc::clone(&context))));
        engine.add_template(TEMPLATE, &self.template)?;
        engine.add_template(OUTPUT_NAME, &self.options.output)?;

        let mut router = OutputRouter::new();
        let rows = context.store().len();
        let numbers: Vec<usize> = if rows == 0 { vec![0] } else { (1..=rows).collect() };

        for number in numbers {
            context.set_row(number);
            let bindings = serde_json::Value::Object(context.store().bindings(number));

            let render = |name: &str| {
                engine
                    .render_named(name, &bindings)
                    .map_err(|err| resolve(&context, err, &bindings))
            };
            let text = render(TEMPLATE)?;
            let destination = render(OUTPUT_NAME)?;

            debug!("row {} rendered {} bytes into '{}'", number, text.len(), destination.trim());
            router.route(Destination::new(destination.trim()), &text)?;
        }

        Ok(RunOutput {
            outputs: router.finish(),
            warnings: context.warnings(),
        })
    }
}

/// Prefers the error a template function recorded over the engine's report
/// of it, and annotates the rest with the row's bindings.
fn resolve(context: &RunContext, err: FxError, bindings: &serde_json::Value) -> FxError {
    match context.take_abort() {
        Some(abort) => abort,
        None => err.with_row(bindings.clone()),
    }
}
