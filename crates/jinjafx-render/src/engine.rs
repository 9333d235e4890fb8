//! Template engine abstraction.
//!
//! Rows are rendered through the [`TemplateEngine`] trait. The implementation
//! used by [`JinjaFx`](crate::JinjaFx) is [`MiniJinjaEngine`], configured from
//! [`RunOptions`] (block trimming, trailing newline, strict undefined).

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::error::Result;
use crate::options::RunOptions;

/// A template engine that renders named templates against row bindings.
pub trait TemplateEngine: Send + Sync {
    /// Compiles and stores a template under `name`.
    fn add_template(&mut self, name: &str, source: &str) -> Result<()>;

    /// Renders a template previously added with
    /// [`add_template`](Self::add_template).
    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String>;
}

/// MiniJinja-based template engine.
///
/// # Example
///
/// ```rust
/// use jinjafx_render::{MiniJinjaEngine, TemplateEngine};
/// use serde_json::json;
///
/// let mut engine = MiniJinjaEngine::new();
/// engine.add_template("port", "interface {{ port }}").unwrap();
/// let output = engine.render_named("port", &json!({"port": "eth0"})).unwrap();
/// assert_eq!(output, "interface eth0");
/// ```
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    /// Creates an engine with the default run options.
    pub fn new() -> Self {
        Self::with_options(&RunOptions::default())
    }

    pub fn with_options(options: &RunOptions) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(options.trim_blocks);
        env.set_lstrip_blocks(options.lstrip_blocks);
        env.set_keep_trailing_newline(options.keep_trailing_newline);
        if options.strict_undefined {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        Self { env }
    }

    /// Makes `value` visible to every template as `name`.
    pub fn add_global(&mut self, name: impl Into<String>, value: Value) {
        self.env.add_global(name.into(), value);
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())?;
        Ok(())
    }

    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String> {
        let tmpl = self.env.get_template(name)?;
        Ok(tmpl.render(Value::from_serialize(data))?)
    }
}
