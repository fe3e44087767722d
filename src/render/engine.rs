//! @acp:module "Placeholder Templates"
//! @acp:summary "LaTeX-friendly Jinja dialect used by entrypoints, partials and fragments"
//! @acp:domain render
//! @acp:layer parser
//!
//! Jinja with LaTeX-safe delimiters:
//! - `\VAR{path}` and `\VAR{path|filter|filter("arg")}`
//! - `\BLOCK{if path}..\BLOCK{else}..\BLOCK{endif}`, `if not path` negates
//! - `\BLOCK{for item in path}..\BLOCK{endfor}` with `loop.index`, `loop.first`, `loop.last`
//! - `\#{comment}`
//!
//! A newline directly after a `\BLOCK{..}` tag is dropped. Backslashes inside
//! quoted filter arguments are written doubled (`join(" \\and ")`).

use std::fmt;
use std::fmt::Write as _;

use minijinja::syntax::SyntaxConfig;
use minijinja::value::Value as JinjaValue;
use minijinja::{AutoEscape, Environment, ErrorKind, Output, State, UndefinedBehavior};
use serde_json::Value;

use super::escape::latex_escape;
use crate::error::{Result, TexsmithError};

/// @acp:summary "A compiled placeholder template"
#[derive(Clone)]
pub struct Template {
    origin: String,
    environment: Environment<'static>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").field("origin", &self.origin).finish()
    }
}

impl Template {
    /// Compile `source`. `origin` names the file or partial in error messages.
    pub fn parse(origin: impl Into<String>, source: &str) -> Result<Self> {
        let origin = origin.into();
        let mut environment = environment(&origin)?;
        environment
            .add_template_owned(origin.clone(), source.to_string())
            .map_err(|err| failure(&origin, err))?;
        Ok(Self { origin, environment })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Render against a JSON context. Missing variables render empty.
    pub fn render(&self, context: &Value) -> Result<String> {
        self.environment
            .get_template(&self.origin)
            .and_then(|template| template.render(context))
            .map_err(|err| failure(&self.origin, err))
    }
}

/// Compile and render in one step.
pub fn render_str(origin: &str, source: &str, context: &Value) -> Result<String> {
    Template::parse(origin, source)?.render(context)
}

fn failure(origin: &str, err: minijinja::Error) -> TexsmithError {
    TexsmithError::Template {
        origin: origin.to_string(),
        message: err.to_string(),
    }
}

fn environment(origin: &str) -> Result<Environment<'static>> {
    let syntax = SyntaxConfig::builder()
        .block_delimiters("\\BLOCK{", "}")
        .variable_delimiters("\\VAR{", "}")
        .comment_delimiters("\\#{", "}")
        .build()
        .map_err(|err| failure(origin, err))?;

    let mut environment = Environment::new();
    environment.set_syntax(syntax);
    environment.set_trim_blocks(true);
    environment.set_keep_trailing_newline(true);
    environment.set_undefined_behavior(UndefinedBehavior::Chainable);
    environment.set_auto_escape_callback(|_| AutoEscape::None);
    environment.set_formatter(format_value);

    environment.add_filter("escape", escape);
    environment.add_filter("e", escape);
    environment.add_filter("upper", upper);
    environment.add_filter("lower", lower);
    environment.add_filter("trim", trim);
    environment.add_filter("join", join);
    environment.add_filter("default", default);
    Ok(environment)
}

fn to_json(value: &JinjaValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Render a value as text. Lists join with `, `, none and mappings render empty.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Object(_) => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
    }
}

fn format_value(out: &mut Output<'_>, _state: &State<'_, '_>, value: &JinjaValue) -> std::result::Result<(), minijinja::Error> {
    out.write_str(&display_value(&to_json(value)))
        .map_err(|_| minijinja::Error::new(ErrorKind::WriteFailure, "failed to write rendered value"))
}

/// Apply `f` to a string, or to every item of a list.
fn map_strings(value: &JinjaValue, f: impl Fn(&str) -> String) -> JinjaValue {
    let mapped = match to_json(value) {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| Value::String(f(&display_value(item))))
                .collect(),
        ),
        Value::Null => Value::Null,
        other => Value::String(f(&display_value(&other))),
    };
    JinjaValue::from_serialize(&mapped)
}

fn escape(value: JinjaValue) -> JinjaValue {
    map_strings(&value, latex_escape)
}

fn upper(value: JinjaValue) -> JinjaValue {
    map_strings(&value, |s| s.to_uppercase())
}

fn lower(value: JinjaValue) -> JinjaValue {
    map_strings(&value, |s| s.to_lowercase())
}

fn trim(value: JinjaValue) -> JinjaValue {
    map_strings(&value, |s| s.trim().to_string())
}

fn join(value: JinjaValue, separator: Option<String>) -> JinjaValue {
    match to_json(&value) {
        Value::Array(items) => JinjaValue::from(
            items
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(separator.as_deref().unwrap_or(", ")),
        ),
        _ => value,
    }
}

/// Empty strings and lists count as missing, not only undefined values.
fn default(value: JinjaValue, fallback: Option<JinjaValue>) -> JinjaValue {
    if value.is_true() {
        value
    } else {
        fallback.unwrap_or_else(|| JinjaValue::from(""))
    }
}
