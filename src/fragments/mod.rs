//! @acp:module "Fragments"
//! @acp:summary "Manifest-driven LaTeX package generators and their activation"
//! @acp:domain core
//! @acp:layer service
//!
//! A fragment is a data record loaded from `fragment.toml`. Every fragment
//! selected for a build is a candidate: it contributes attributes, emitters
//! and partials. Activation only decides whether its package is emitted.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{AttributeOwner, AttributeRegistry, AttributeSpec};
use crate::document::Document;
use crate::error::{Result, TexsmithError};
use crate::partials::PartialResolver;
use crate::render::engine::Template;
use crate::templates::{builtin, load_partial_bodies, ComponentRoot, LoadedTemplate};

pub const FRAGMENT_MANIFEST: &str = "fragment.toml";

/// @acp:summary "When a fragment's package is emitted"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    #[default]
    Always,
    Conditional,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationSpec {
    #[serde(default)]
    pub mode: ActivationMode,
    /// Constructs whose use activates the fragment
    #[serde(default)]
    pub constructs: Vec<String>,
    /// Regex matched against the rendered LaTeX
    #[serde(default)]
    pub pattern: Option<String>,
}

/// @acp:summary "Fragment declaration as written in fragment.toml"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Package body template, rendered into `<name>.sty`
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeSpec>,
    #[serde(default)]
    pub emitters: IndexMap<String, Value>,
    #[serde(default)]
    pub partials: IndexMap<String, String>,
    #[serde(default)]
    pub required_partials: Vec<String>,
    #[serde(default)]
    pub activation: ActivationSpec,
}

/// @acp:summary "A loaded fragment"
#[derive(Debug, Clone)]
pub struct Fragment {
    pub manifest: FragmentManifest,
    pub root: ComponentRoot,
    pub partials: IndexMap<String, String>,
    body: Template,
    pattern: Option<Regex>,
}

impl Fragment {
    /// @acp:summary "Load fragment.toml and the files it references"
    pub fn load(root: ComponentRoot) -> Result<Self> {
        let label = root.label(FRAGMENT_MANIFEST);
        let text = root.read_to_string(FRAGMENT_MANIFEST)?;
        let manifest: FragmentManifest =
            toml::from_str(&text).map_err(|err| TexsmithError::manifest(label.clone(), err.to_string()))?;

        let pattern = match &manifest.activation.pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|err| {
                TexsmithError::manifest(label.clone(), format!("invalid activation pattern: {}", err))
            })?),
            None => None,
        };
        if manifest.activation.mode == ActivationMode::Conditional
            && manifest.activation.constructs.is_empty()
            && pattern.is_none()
        {
            return Err(TexsmithError::manifest(
                label,
                "conditional activation needs 'constructs' or 'pattern'",
            ));
        }

        let body = match &manifest.entrypoint {
            Some(entrypoint) => Template::parse(
                root.label(entrypoint).display().to_string(),
                &root.read_to_string(entrypoint)?,
            )?,
            None => Template::parse(label.display().to_string(), "")?,
        };
        let partials = load_partial_bodies(&root, &manifest.partials)?;

        Ok(Self {
            manifest,
            root,
            partials,
            body,
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn owner(&self) -> AttributeOwner {
        AttributeOwner::Fragment(self.manifest.name.clone())
    }

    pub fn is_conditional(&self) -> bool {
        self.manifest.activation.mode == ActivationMode::Conditional
    }

    /// Whether the rendered content triggers this fragment.
    pub fn is_active(&self, constructs: &BTreeSet<String>, latex: &str) -> bool {
        if !self.is_conditional() {
            return true;
        }
        let by_construct = self
            .manifest
            .activation
            .constructs
            .iter()
            .any(|construct| constructs.contains(construct));
        let by_pattern = self.pattern.as_ref().map(|re| re.is_match(latex)).unwrap_or(false);
        by_construct || by_pattern
    }

    /// Render the `.sty` body. A `\ProvidesPackage` line is added when missing.
    pub fn render_package(&self, context: &Value) -> Result<String> {
        let body = self.body.render(context)?;
        if body.contains("\\ProvidesPackage") {
            return Ok(body);
        }
        Ok(format!(
            "\\NeedsTeXFormat{{LaTeX2e}}\n\\ProvidesPackage{{{}}}\n{}",
            self.manifest.name, body
        ))
    }
}

/// Fragment names for a build: `press.fragments` of the first document that
/// sets it (else the template defaults), then `extra`, first occurrence kept.
pub fn select_fragment_names(documents: &[Document], template_defaults: &[String], extra: &[String]) -> Vec<String> {
    let declared = documents.iter().find_map(|document| {
        document.meta("press.fragments").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
    });

    let mut names: Vec<String> = Vec::new();
    for name in declared
        .unwrap_or_else(|| template_defaults.to_vec())
        .into_iter()
        .chain(extra.iter().cloned())
    {
        let name = name.trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Look a fragment up in the template's `fragments/` directory, then the built-ins.
pub fn locate_fragment(name: &str, template: &LoadedTemplate) -> Result<ComponentRoot> {
    if let Some(dir) = template.fragment_dir(name) {
        return Ok(ComponentRoot::Directory(dir));
    }
    builtin::fragment(name)
        .map(ComponentRoot::Builtin)
        .ok_or_else(|| TexsmithError::FragmentNotFound {
            name: name.to_string(),
            template: template.name().to_string(),
        })
}

/// @acp:summary "Candidate fragments of one build, in declaration order"
#[derive(Debug, Clone, Default)]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
}

impl FragmentSet {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    /// Load every named fragment for `template`.
    pub fn load(names: &[String], template: &LoadedTemplate) -> Result<Self> {
        let fragments = names
            .iter()
            .map(|name| -> Result<Fragment> {
                let fragment = Fragment::load(locate_fragment(name, template)?)?;
                if fragment.name() != name {
                    tracing::debug!(requested = %name, declared = %fragment.name(), "fragment manifest name differs from lookup name");
                }
                Ok(fragment)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fragments })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Register owned attributes and emitters of every candidate.
    pub fn register_attributes(&self, registry: &mut AttributeRegistry) -> Result<()> {
        for fragment in &self.fragments {
            registry.register_component(&fragment.owner(), &fragment.manifest.attributes, &fragment.manifest.emitters)?;
        }
        Ok(())
    }

    /// Contribute partial overrides and requirements of every candidate.
    pub fn contribute_partials(&self, resolver: &mut PartialResolver) {
        for fragment in &self.fragments {
            if !fragment.partials.is_empty() {
                resolver.fragment_overrides(fragment.name(), fragment.partials.clone());
            }
            resolver.require(fragment.owner().to_string(), fragment.manifest.required_partials.clone());
        }
    }

    /// Fragments whose package is emitted, in declaration order.
    pub fn active(&self, constructs: &BTreeSet<String>, latex: &str) -> Vec<&Fragment> {
        self.fragments
            .iter()
            .filter(|fragment| {
                let active = fragment.is_active(constructs, latex);
                tracing::debug!(fragment = %fragment.name(), active, "fragment activation");
                active
            })
            .collect()
    }
}
