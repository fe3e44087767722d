//! @acp:module "Attribute Types"
//! @acp:summary "Attribute declarations, owners and the closed type coercion table"
//! @acp:domain core
//! @acp:layer model

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// @acp:summary "Closed set of attribute value types"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    Float,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "array")]
    List,
    #[serde(alias = "dict", alias = "map")]
    Mapping,
    #[default]
    Any,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::List => "list",
            AttributeType::Mapping => "mapping",
            AttributeType::Any => "any",
        };
        write!(f, "{}", name)
    }
}

type Coercion = fn(&Value) -> Option<Value>;

impl AttributeType {
    /// Infer the type from a declared default. Null infers `Any`.
    pub fn infer(default: &Value) -> Self {
        match default {
            Value::Null => AttributeType::Any,
            Value::Bool(_) => AttributeType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => AttributeType::Integer,
            Value::Number(_) => AttributeType::Float,
            Value::String(_) => AttributeType::String,
            Value::Array(_) => AttributeType::List,
            Value::Object(_) => AttributeType::Mapping,
        }
    }

    fn coercion(self) -> Coercion {
        match self {
            AttributeType::String => coerce_string,
            AttributeType::Integer => coerce_integer,
            AttributeType::Float => coerce_float,
            AttributeType::Boolean => coerce_boolean,
            AttributeType::List => coerce_list,
            AttributeType::Mapping => coerce_mapping,
            AttributeType::Any => coerce_any,
        }
    }

    /// Coerce a raw value. `None` means the value cannot represent this type.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        (self.coercion())(value)
    }
}

fn coerce_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.fract() == 0.0).then(|| Value::from(f as i64))
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::Object(_) | Value::Null => None,
        scalar => Some(Value::Array(vec![scalar.clone()])),
    }
}

fn coerce_mapping(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        _ => None,
    }
}

fn coerce_any(value: &Value) -> Option<Value> {
    Some(value.clone())
}

/// @acp:summary "Escaping applied as the last resolution step"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    #[default]
    None,
    Latex,
}

/// @acp:summary "Component permitted to declare an attribute"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum AttributeOwner {
    Template(String),
    Fragment(String),
}

impl AttributeOwner {
    pub fn name(&self) -> &str {
        match self {
            AttributeOwner::Template(name) | AttributeOwner::Fragment(name) => name,
        }
    }
}

impl fmt::Display for AttributeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeOwner::Template(name) => write!(f, "template '{}'", name),
            AttributeOwner::Fragment(name) => write!(f, "fragment '{}'", name),
        }
    }
}

fn default_true() -> bool {
    true
}

/// @acp:summary "Attribute declaration as written in a manifest"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeSpec {
    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default, rename = "type")]
    pub kind: Option<AttributeType>,

    /// Metadata paths checked before the `press.*` fallbacks
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default = "default_true")]
    pub allow_empty: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub choices: Vec<Value>,

    #[serde(default)]
    pub escape: EscapeMode,

    #[serde(default, alias = "normalizer")]
    pub normaliser: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl Default for AttributeSpec {
    fn default() -> Self {
        Self {
            default: None,
            kind: None,
            sources: Vec::new(),
            allow_empty: true,
            required: false,
            choices: Vec::new(),
            escape: EscapeMode::None,
            normaliser: None,
            description: None,
        }
    }
}

impl AttributeSpec {
    pub fn into_declaration(self, name: impl Into<String>, owner: AttributeOwner) -> AttributeDeclaration {
        let default = self.default.unwrap_or(Value::Null);
        let kind = self.kind.unwrap_or_else(|| AttributeType::infer(&default));
        AttributeDeclaration {
            name: name.into(),
            owner,
            default,
            kind,
            sources: self.sources,
            allow_empty: self.allow_empty,
            required: self.required,
            choices: self.choices,
            escape: self.escape,
            normaliser: self.normaliser,
            description: self.description,
        }
    }
}

/// @acp:summary "Immutable attribute declaration bound to its owner"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDeclaration {
    pub name: String,
    pub owner: AttributeOwner,
    pub default: Value,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub sources: Vec<String>,
    pub allow_empty: bool,
    pub required: bool,
    pub choices: Vec<Value>,
    pub escape: EscapeMode,
    pub normaliser: Option<String>,
    pub description: Option<String>,
}

impl AttributeDeclaration {
    /// Minimal declaration, mostly for tests and programmatic registries.
    pub fn new(name: impl Into<String>, owner: AttributeOwner, default: Value) -> Self {
        AttributeSpec {
            default: Some(default),
            ..AttributeSpec::default()
        }
        .into_declaration(name, owner)
    }

    pub fn with_type(mut self, kind: AttributeType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_escape(mut self, escape: EscapeMode) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_normaliser(mut self, normaliser: &str) -> Self {
        self.normaliser = Some(normaliser.to_string());
        self
    }
}
