//! @acp:module "Templates"
//! @acp:summary "Template manifests and loaded template contracts"
//! @acp:domain templates
//! @acp:layer model
//!
//! A template root holds `manifest.toml` (directly or under `template/`),
//! the entrypoint, partial overrides, assets and an optional `fragments/`
//! directory with template-local fragments.

pub mod builtin;
pub mod discovery;

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeOwner, AttributeSpec};
use crate::error::{Result, TexsmithError};
use crate::slots::{SlotSet, SlotSpec};

pub use builtin::BuiltinBundle;
pub use discovery::{list_templates, locate_template, load_template, DiscoveryRoots, TemplateListing, TemplateTier};

pub const MANIFEST_FILE: &str = "manifest.toml";

/// @acp:summary "Declared contract of a template, as written in manifest.toml"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub entrypoint: String,
    /// LaTeX engines the template is known to work with
    #[serde(default)]
    pub engines: Vec<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeSpec>,
    #[serde(default)]
    pub slots: IndexMap<String, SlotSpec>,
    /// Destination in the build directory -> source relative to the template root
    #[serde(default)]
    pub assets: IndexMap<String, String>,
    /// Partial overrides: construct name -> `.tex` file or inline body
    #[serde(default)]
    pub partials: IndexMap<String, String>,
    /// Fragments used when the document does not set `press.fragments`
    #[serde(default)]
    pub fragments: Vec<String>,
    #[serde(default)]
    pub required_partials: Vec<String>,
}

/// @acp:summary "Where a template or fragment's files live"
#[derive(Debug, Clone)]
pub enum ComponentRoot {
    Builtin(&'static BuiltinBundle),
    Directory(PathBuf),
}

impl ComponentRoot {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ComponentRoot::Builtin(_) => None,
            ComponentRoot::Directory(path) => Some(path),
        }
    }

    /// Path used in messages. Built-ins render as `builtin:<name>`.
    pub fn label(&self, file: &str) -> PathBuf {
        match self {
            ComponentRoot::Builtin(bundle) => PathBuf::from(format!("builtin:{}/{}", bundle.name, file)),
            ComponentRoot::Directory(path) => path.join(file),
        }
    }

    pub fn read_to_string(&self, relative: &str) -> Result<String> {
        match self {
            ComponentRoot::Builtin(bundle) => bundle
                .file(relative)
                .map(str::to_string)
                .ok_or_else(|| TexsmithError::manifest(self.label(relative), "file not bundled")),
            ComponentRoot::Directory(path) => {
                let full = path.join(relative);
                std::fs::read_to_string(&full)
                    .map_err(|err| TexsmithError::manifest(full, format!("cannot read: {}", err)))
            }
        }
    }

    pub fn read_bytes(&self, relative: &str) -> Result<Vec<u8>> {
        match self {
            ComponentRoot::Builtin(_) => self.read_to_string(relative).map(String::into_bytes),
            ComponentRoot::Directory(path) => {
                let full = path.join(relative);
                std::fs::read(&full).map_err(|err| TexsmithError::manifest(full, format!("cannot read: {}", err)))
            }
        }
    }
}

/// Partial and fragment values ending in `.tex` name a file, anything else is an inline body.
pub(crate) fn load_partial_bodies(
    root: &ComponentRoot,
    declared: &IndexMap<String, String>,
) -> Result<IndexMap<String, String>> {
    declared
        .iter()
        .map(|(name, value)| -> Result<(String, String)> {
            let body = if value.trim_end().ends_with(".tex") && !value.contains('\n') {
                root.read_to_string(value.trim())?
            } else {
                value.clone()
            };
            Ok((name.clone(), body))
        })
        .collect()
}

/// @acp:summary "A template ready for a build"
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub manifest: TemplateManifest,
    pub tier: TemplateTier,
    pub root: ComponentRoot,
    pub slots: SlotSet,
    pub entrypoint_source: String,
    /// Override bodies keyed by construct name
    pub partials: IndexMap<String, String>,
}

impl LoadedTemplate {
    /// @acp:summary "Parse and validate a manifest plus the files it references"
    pub fn load(root: ComponentRoot, tier: TemplateTier) -> Result<Self> {
        let manifest_label = root.label(MANIFEST_FILE);
        let text = root.read_to_string(MANIFEST_FILE)?;
        let manifest: TemplateManifest = toml::from_str(&text)
            .map_err(|err| TexsmithError::manifest(manifest_label.clone(), err.to_string()))?;

        if manifest.name.trim().is_empty() {
            return Err(TexsmithError::manifest(manifest_label, "'name' must not be empty"));
        }
        if manifest.slots.is_empty() {
            return Err(TexsmithError::manifest(manifest_label, "a template declares at least one slot"));
        }
        let slots = SlotSet::from_specs(&manifest.slots)
            .map_err(|message| TexsmithError::manifest(manifest_label.clone(), message))?;

        let entrypoint_source = root.read_to_string(&manifest.entrypoint)?;
        let partials = load_partial_bodies(&root, &manifest.partials)?;

        tracing::debug!(
            template = %manifest.name,
            tier = %tier,
            slots = slots.iter().count(),
            attributes = manifest.attributes.len(),
            "loaded template"
        );

        Ok(Self {
            manifest,
            tier,
            root,
            slots,
            entrypoint_source,
            partials,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn owner(&self) -> AttributeOwner {
        AttributeOwner::Template(self.manifest.name.clone())
    }

    /// Output file name for the entrypoint: `<stem>.tex`.
    pub fn output_name(&self) -> String {
        let stem = Path::new(&self.manifest.entrypoint)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.manifest.name.clone());
        format!("{}.tex", stem)
    }

    /// Template-local fragment directory, if the template lives on disk.
    pub fn fragment_dir(&self, name: &str) -> Option<PathBuf> {
        let dir = self.root.path()?.join("fragments").join(name);
        dir.is_dir().then_some(dir)
    }
}

impl fmt::Display for LoadedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.manifest.name, self.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_article_contract() {
        let root = ComponentRoot::Builtin(builtin::template("article").unwrap());
        let template = LoadedTemplate::load(root, TemplateTier::Builtin).unwrap();
        assert_eq!(template.name(), "article");
        assert_eq!(template.slots.default_name(), "mainmatter");
        assert_eq!(template.slots.get("mainmatter").unwrap().base_level, 1);
        assert!(template.slots.get("abstract").unwrap().strip_heading);
        assert_eq!(template.output_name(), "template.tex");
        assert_eq!(template.manifest.fragments, vec!["ts-geometry", "ts-code", "ts-links"]);
    }

    #[test]
    fn test_builtin_book_slots() {
        let root = ComponentRoot::Builtin(builtin::template("book").unwrap());
        let template = LoadedTemplate::load(root, TemplateTier::Builtin).unwrap();
        let names: Vec<&String> = template.slots.names().collect();
        assert_eq!(names, vec!["frontmatter", "mainmatter", "appendix", "backmatter"]);
        assert_eq!(template.slots.default_slot().base_level, 0);
    }

    #[test]
    fn test_directory_template_with_partials() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"
            name = "memo"
            entrypoint = "memo.tex"

            [slots.body]
            default = true
            base_level = 1

            [partials]
            bold = "partials/bold.tex"
            italic = "\\textit{\\VAR{content}}"
            "#,
        )
        .unwrap();
        fs::write(dir.path().join("memo.tex"), "\\VAR{body}").unwrap();
        fs::write(dir.path().join("partials/bold.tex"), "\\textbf{\\VAR{content}}").unwrap();

        let template =
            LoadedTemplate::load(ComponentRoot::Directory(dir.path().to_path_buf()), TemplateTier::Path).unwrap();
        assert_eq!(template.partials["bold"], "\\textbf{\\VAR{content}}");
        assert_eq!(template.partials["italic"], "\\textit{\\VAR{content}}");
        assert_eq!(template.output_name(), "memo.tex");
    }

    #[test]
    fn test_manifest_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "name = \"x\"\nentrypoint = \"x.tex\"\n").unwrap();
        let err = LoadedTemplate::load(ComponentRoot::Directory(dir.path().to_path_buf()), TemplateTier::Path)
            .unwrap_err();
        assert_eq!(err.code(), "manifest");
        assert!(err.to_string().contains("at least one slot"));

        fs::write(dir.path().join(MANIFEST_FILE), "entrypoint = \"x.tex\"\n").unwrap();
        let err = LoadedTemplate::load(ComponentRoot::Directory(dir.path().to_path_buf()), TemplateTier::Path)
            .unwrap_err();
        assert_eq!(err.code(), "manifest");
    }
}
