//! @acp:module "Partials"
//! @acp:summary "Three-tier partial precedence with fragment conflict detection"
//! @acp:domain core
//! @acp:layer service
//!
//! A single pass over a flat precedence list: template override, then the
//! one fragment providing the name, then the core default. Two fragment
//! providers without a template override is a conflict.

pub mod defaults;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TexsmithError};
use crate::render::engine::Template;

pub use defaults::{core_partial, CONSTRUCTS};

/// @acp:summary "Which tier supplied the active partial"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", content = "name", rename_all = "lowercase")]
pub enum PartialSource {
    Template(String),
    Fragment(String),
    Core,
}

/// @acp:summary "The active implementation of one partial"
#[derive(Debug, Clone)]
pub struct ResolvedPartial {
    pub name: String,
    pub source: PartialSource,
    template: Template,
}

impl ResolvedPartial {
    pub fn render(&self, context: &Value) -> Result<String> {
        self.template.render(context)
    }
}

/// @acp:summary "One active partial per name for a render"
#[derive(Debug, Clone, Default)]
pub struct PartialSet {
    partials: IndexMap<String, ResolvedPartial>,
}

impl PartialSet {
    /// Core defaults only.
    pub fn core() -> Result<Self> {
        PartialResolver::new("core").resolve()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPartial> {
        self.partials.get(name)
    }

    pub fn source(&self, name: &str) -> Option<&PartialSource> {
        self.partials.get(name).map(|partial| &partial.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    /// Name to tier, for reports.
    pub fn sources(&self) -> IndexMap<String, PartialSource> {
        self.partials
            .iter()
            .map(|(name, partial)| (name.clone(), partial.source.clone()))
            .collect()
    }
}

/// Partial bodies contributed by one fragment.
#[derive(Debug, Clone, Default)]
struct FragmentPartials {
    fragment: String,
    bodies: IndexMap<String, String>,
}

/// @acp:summary "Collects overrides from every tier and picks one per name"
#[derive(Debug, Clone)]
pub struct PartialResolver {
    template: String,
    template_overrides: IndexMap<String, String>,
    fragments: Vec<FragmentPartials>,
    required: Vec<(String, Vec<String>)>,
}

impl PartialResolver {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            template_overrides: IndexMap::new(),
            fragments: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn template_override(&mut self, name: impl Into<String>, body: impl Into<String>) -> &mut Self {
        self.template_overrides.insert(name.into(), body.into());
        self
    }

    pub fn fragment_overrides(&mut self, fragment: impl Into<String>, bodies: IndexMap<String, String>) -> &mut Self {
        self.fragments.push(FragmentPartials {
            fragment: fragment.into(),
            bodies,
        });
        self
    }

    /// Names that must resolve to some provider, declared by `component`.
    pub fn require(&mut self, component: impl Into<String>, names: Vec<String>) -> &mut Self {
        if !names.is_empty() {
            self.required.push((component.into(), names));
        }
        self
    }

    /// @acp:summary "Resolve every known partial name"
    pub fn resolve(&self) -> Result<PartialSet> {
        let mut names: Vec<&str> = CONSTRUCTS.to_vec();
        let extra = self
            .template_overrides
            .keys()
            .chain(self.fragments.iter().flat_map(|f| f.bodies.keys()));
        for name in extra {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        let mut partials = IndexMap::new();
        for name in names {
            if let Some(partial) = self.resolve_one(name)? {
                tracing::debug!(partial = %name, source = ?partial.source, "resolved partial");
                partials.insert(name.to_string(), partial);
            }
        }

        for (component, required) in &self.required {
            for name in required {
                if !partials.contains_key(name) {
                    return Err(TexsmithError::MissingPartial {
                        partial: name.clone(),
                        required_by: component.clone(),
                    });
                }
            }
        }

        Ok(PartialSet { partials })
    }

    fn resolve_one(&self, name: &str) -> Result<Option<ResolvedPartial>> {
        if let Some(body) = self.template_overrides.get(name) {
            let origin = format!("template '{}' partial '{}'", self.template, name);
            return Ok(Some(ResolvedPartial {
                name: name.to_string(),
                source: PartialSource::Template(self.template.clone()),
                template: Template::parse(origin, body)?,
            }));
        }

        let providers: Vec<&FragmentPartials> = self
            .fragments
            .iter()
            .filter(|f| f.bodies.contains_key(name))
            .collect();
        match providers.as_slice() {
            [] => {}
            [single] => {
                let origin = format!("fragment '{}' partial '{}'", single.fragment, name);
                let body = &single.bodies[name];
                return Ok(Some(ResolvedPartial {
                    name: name.to_string(),
                    source: PartialSource::Fragment(single.fragment.clone()),
                    template: Template::parse(origin, body)?,
                }));
            }
            several => {
                return Err(TexsmithError::PartialConflict {
                    partial: name.to_string(),
                    providers: several.iter().map(|f| f.fragment.clone()).collect(),
                });
            }
        }

        match core_partial(name) {
            Some(body) => Ok(Some(ResolvedPartial {
                name: name.to_string(),
                source: PartialSource::Core,
                template: Template::parse(format!("core partial '{}'", name), body)?,
            })),
            None => Ok(None),
        }
    }
}
