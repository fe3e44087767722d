//! @acp:module "Attribute Resolver"
//! @acp:summary "Layered precedence merge producing one typed value per attribute"
//! @acp:domain core
//! @acp:layer service
//!
//! Precedence, highest first:
//! explicit override, front matter (document order, each declared source
//! path then `press.press.<name>`, `press.<name>`, `<name>`), fragment
//! emitter default, owned default, core default.
//!
//! Each accepted candidate is coerced, normalised, checked against its
//! choices and finally escaped. Resolution is a pure function of its inputs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::normalisers::{self, apply_escape};
use super::registry::AttributeRegistry;
use super::types::AttributeDeclaration;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::frontmatter::{is_empty_value, lookup_path, type_name};
use crate::error::{Result, TexsmithError};

/// Front matter keys that configure the build rather than carry metadata.
const RESERVED_KEYS: &[&str] = &["press", "references"];

/// Values every template may reference without declaring them.
pub fn core_defaults() -> IndexMap<String, Value> {
    let mut core = IndexMap::new();
    core.insert("title".to_string(), json!(""));
    core.insert("subtitle".to_string(), json!(""));
    core.insert("authors".to_string(), json!([]));
    core.insert("date".to_string(), json!(""));
    core.insert("language".to_string(), json!("english"));
    core.insert("keywords".to_string(), json!([]));
    core
}

/// @acp:summary "Where a resolved value came from"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ValueOrigin {
    Override,
    FrontMatter { document: usize, path: String },
    Emitter { fragment: String },
    Default,
    Core,
    Unset,
}

/// @acp:summary "Final value of one attribute with its provenance"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAttribute {
    pub value: Value,
    pub origin: ValueOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// @acp:summary "Attribute name to resolved value for one render"
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ResolvedAttributeSet {
    values: IndexMap<String, ResolvedAttribute>,
}

impl ResolvedAttributeSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|attr| &attr.value)
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.values.get(name)
    }

    pub fn origin(&self, name: &str) -> Option<&ValueOrigin> {
        self.values.get(name).map(|attr| &attr.origin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedAttribute)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flat `name -> value` mapping used as placeholder context.
    pub fn to_context(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect()
    }

    fn insert(&mut self, name: String, attribute: ResolvedAttribute) {
        self.values.insert(name, attribute);
    }
}

/// @acp:summary "Resolves declared and free-form attributes against all value layers"
pub struct AttributeResolver<'r> {
    registry: &'r AttributeRegistry,
    core: IndexMap<String, Value>,
}

impl<'r> AttributeResolver<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self {
            registry,
            core: core_defaults(),
        }
    }

    pub fn with_core_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.core.insert(name.into(), value);
        self
    }

    /// @acp:summary "Resolve every attribute for one render"
    ///
    /// `front_matter` holds one mapping per input document, in document order.
    pub fn resolve(
        &self,
        overrides: &Map<String, Value>,
        front_matter: &[&Value],
        sink: &dyn DiagnosticSink,
    ) -> Result<ResolvedAttributeSet> {
        let mut resolved = ResolvedAttributeSet::default();

        for declaration in self.registry.declarations() {
            let attribute = self.resolve_declared(declaration, overrides, front_matter, sink)?;
            tracing::debug!(
                attribute = %declaration.name,
                origin = ?attribute.origin,
                "resolved attribute"
            );
            resolved.insert(declaration.name.clone(), attribute);
        }

        // Core names nobody declared still get a value
        for (name, core_value) in &self.core {
            if resolved.contains(name) {
                continue;
            }
            let attribute = self
                .candidates(name, &[], overrides, front_matter, None)
                .into_iter()
                .find(|(_, value)| !value.is_null())
                .map(|(origin, value)| ResolvedAttribute {
                    value: value.clone(),
                    origin,
                    owner: None,
                })
                .unwrap_or_else(|| ResolvedAttribute {
                    value: core_value.clone(),
                    origin: ValueOrigin::Core,
                    owner: None,
                });
            resolved.insert(name.clone(), attribute);
        }

        self.pass_through(&mut resolved, overrides, front_matter);
        Ok(resolved)
    }

    fn resolve_declared(
        &self,
        declaration: &AttributeDeclaration,
        overrides: &Map<String, Value>,
        front_matter: &[&Value],
        sink: &dyn DiagnosticSink,
    ) -> Result<ResolvedAttribute> {
        let name = &declaration.name;
        let candidates = self.candidates(
            name,
            &declaration.sources,
            overrides,
            front_matter,
            Some(&declaration.default),
        );

        for (origin, raw) in candidates {
            if raw.is_null() {
                continue;
            }
            let coerced = declaration.kind.coerce(raw).ok_or_else(|| TexsmithError::AttributeType {
                name: name.clone(),
                owner: declaration.owner.to_string(),
                expected: declaration.kind.to_string(),
                received: format!("{} ({})", raw, type_name(raw)),
            })?;

            if !declaration.allow_empty && is_blank(&coerced) {
                sink.emit(
                    Diagnostic::info(
                        "attribute-empty-skipped",
                        format!("empty value for '{}' from {:?} ignored", name, origin),
                    )
                    .with_component(declaration.owner.name()),
                );
                continue;
            }

            let value = self.finish(declaration, coerced)?;
            return Ok(ResolvedAttribute {
                value,
                origin,
                owner: Some(declaration.owner.to_string()),
            });
        }

        if declaration.required {
            return Err(TexsmithError::AttributeMissing {
                name: name.clone(),
                owner: declaration.owner.to_string(),
            });
        }

        Ok(ResolvedAttribute {
            value: Value::Null,
            origin: ValueOrigin::Unset,
            owner: Some(declaration.owner.to_string()),
        })
    }

    /// Normalise, check choices, then escape.
    fn finish(&self, declaration: &AttributeDeclaration, value: Value) -> Result<Value> {
        let value = match declaration.normaliser.as_deref() {
            Some(normaliser_name) => {
                let normaliser = normalisers::lookup(normaliser_name).ok_or_else(|| {
                    TexsmithError::manifest(
                        declaration.owner.to_string(),
                        format!("unknown normaliser '{}'", normaliser_name),
                    )
                })?;
                normaliser(&value, &declaration.default).map_err(|reason| {
                    TexsmithError::AttributeType {
                        name: declaration.name.clone(),
                        owner: declaration.owner.to_string(),
                        expected: format!("a value accepted by normaliser '{}'", normaliser_name),
                        received: reason,
                    }
                })?
            }
            None => value,
        };

        if !declaration.choices.is_empty() && !declaration.choices.contains(&value) {
            let allowed: Vec<String> = declaration.choices.iter().map(Value::to_string).collect();
            return Err(TexsmithError::AttributeType {
                name: declaration.name.clone(),
                owner: declaration.owner.to_string(),
                expected: format!("one of {}", allowed.join(", ")),
                received: value.to_string(),
            });
        }

        Ok(apply_escape(declaration.escape, value))
    }

    /// Every candidate value for `name`, highest precedence first.
    fn candidates<'a>(
        &'a self,
        name: &str,
        sources: &[String],
        overrides: &'a Map<String, Value>,
        front_matter: &[&'a Value],
        default: Option<&'a Value>,
    ) -> Vec<(ValueOrigin, &'a Value)> {
        let mut out = Vec::new();

        if let Some(value) = overrides.get(name) {
            out.push((ValueOrigin::Override, value));
        }

        let mut paths: Vec<String> = sources.to_vec();
        for fallback in [
            format!("press.press.{}", name),
            format!("press.{}", name),
            name.to_string(),
        ] {
            if !paths.contains(&fallback) {
                paths.push(fallback);
            }
        }

        // First non-empty value in document order, blank ones only after every document
        let mut blank = Vec::new();
        for (document, meta) in front_matter.iter().enumerate() {
            for path in &paths {
                if let Some(value) = lookup_path(meta, path) {
                    let origin = ValueOrigin::FrontMatter {
                        document,
                        path: path.clone(),
                    };
                    if is_empty_value(value) {
                        blank.push((origin, value));
                    } else {
                        out.push((origin, value));
                    }
                }
            }
        }
        out.extend(blank);

        if let Some(emitter) = self.registry.emitter(name) {
            out.push((
                ValueOrigin::Emitter {
                    fragment: emitter.fragment.clone(),
                },
                &emitter.value,
            ));
        }

        if let Some(default) = default {
            out.push((ValueOrigin::Default, default));
        }

        if let Some(core) = self.core.get(name) {
            out.push((ValueOrigin::Core, core));
        }

        out
    }

    /// Whether an override or front matter supplies a non-empty value for
    /// `name`, probing the same paths resolution does.
    pub fn is_supplied(&self, name: &str, overrides: &Map<String, Value>, front_matter: &[&Value]) -> bool {
        let sources = self
            .registry
            .get(name)
            .map(|declaration| declaration.sources.as_slice())
            .unwrap_or(&[]);
        self.candidates(name, sources, overrides, front_matter, None)
            .into_iter()
            .any(|(origin, value)| {
                matches!(origin, ValueOrigin::Override | ValueOrigin::FrontMatter { .. }) && !is_empty_value(value)
            })
    }

    /// Undeclared overrides, emitters and top-level front matter keys pass through untyped.
    fn pass_through(
        &self,
        resolved: &mut ResolvedAttributeSet,
        overrides: &Map<String, Value>,
        front_matter: &[&Value],
    ) {
        for (name, value) in overrides {
            if !resolved.contains(name) {
                resolved.insert(
                    name.clone(),
                    ResolvedAttribute {
                        value: value.clone(),
                        origin: ValueOrigin::Override,
                        owner: None,
                    },
                );
            }
        }

        for (document, meta) in front_matter.iter().enumerate() {
            let Some(map) = meta.as_object() else {
                continue;
            };
            for (name, value) in map {
                if RESERVED_KEYS.contains(&name.as_str()) || value.is_null() || resolved.contains(name) {
                    continue;
                }
                resolved.insert(
                    name.clone(),
                    ResolvedAttribute {
                        value: value.clone(),
                        origin: ValueOrigin::FrontMatter {
                            document,
                            path: name.clone(),
                        },
                        owner: None,
                    },
                );
            }
        }

        for (name, emitter) in self.registry.emitters() {
            if !resolved.contains(name) {
                resolved.insert(
                    name.clone(),
                    ResolvedAttribute {
                        value: emitter.value.clone(),
                        origin: ValueOrigin::Emitter {
                            fragment: emitter.fragment.clone(),
                        },
                        owner: None,
                    },
                );
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}
