//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule. Handlers turn flags and config
//! into library calls and report through the console.

pub mod attributes;
pub mod output;
pub mod render;
pub mod templates;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Map;

use crate::build::BuildOptions;
use crate::config::TexsmithConfig;
use crate::headings::parse_base_level;
use crate::slots::SlotDirective;
use crate::templates::DiscoveryRoots;

pub use attributes::{execute_attributes, AttributesOptions};
pub use output::{load_documents, parse_attribute, ConsoleSink};
pub use render::{execute_render, RenderOptions};
pub use templates::{execute_templates, TemplatesSubcommand};

/// Flags shared by every command that resolves a build
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    pub template: Option<String>,
    pub output: Option<PathBuf>,
    /// `key=value` strings
    pub attributes: Vec<String>,
    /// `slot:selector` strings
    pub slots: Vec<String>,
    /// Number or sectioning command name
    pub base_level: Option<String>,
    pub no_promote_title: bool,
    pub fragments: Vec<String>,
    pub strict: bool,
}

/// Merge flags over the config file over built-in defaults.
pub fn build_options(config: &TexsmithConfig, roots: &DiscoveryRoots, flags: &BuildFlags) -> Result<BuildOptions> {
    let mut overrides = Map::new();
    for (name, value) in &config.attributes {
        overrides.insert(name.clone(), value.clone());
    }
    for raw in &flags.attributes {
        let (name, value) = parse_attribute(raw)?;
        overrides.insert(name, value);
    }

    let slot_directives = flags
        .slots
        .iter()
        .map(|raw| SlotDirective::parse(raw))
        .collect::<crate::Result<Vec<_>>>()
        .context("Invalid --slot directive")?;

    let base_level = match &flags.base_level {
        Some(raw) => Some(
            parse_base_level(raw)
                .with_context(|| format!("--base-level '{}' is neither a number nor a sectioning command", raw))?,
        ),
        None => config.base_level,
    };

    let mut fragments = config.fragments.clone();
    fragments.extend(flags.fragments.iter().cloned());

    Ok(BuildOptions {
        template: flags.template.clone().unwrap_or_else(|| config.template.clone()),
        output_dir: flags.output.clone().unwrap_or_else(|| config.output_dir.clone()),
        overrides,
        slot_directives,
        base_level,
        promote_title: config.promote_title && !flags.no_promote_title,
        strict: config.strict || flags.strict,
        fragments,
        roots: roots.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flags_override_config() {
        let mut config = TexsmithConfig {
            template: "book".to_string(),
            base_level: Some(2),
            fragments: vec!["ts-links".to_string()],
            ..TexsmithConfig::default()
        };
        config.attributes.insert("fontsize".to_string(), json!("10pt"));
        config.attributes.insert("paper".to_string(), json!("letter"));

        let flags = BuildFlags {
            attributes: vec!["fontsize=12pt".to_string()],
            slots: vec!["abstract:Abstract".to_string()],
            base_level: Some("chapter".to_string()),
            fragments: vec!["ts-code".to_string()],
            no_promote_title: true,
            ..BuildFlags::default()
        };
        let options = build_options(&config, &DiscoveryRoots::default(), &flags).unwrap();
        assert_eq!(options.template, "book");
        assert_eq!(options.overrides.get("fontsize"), Some(&json!("12pt")));
        assert_eq!(options.overrides.get("paper"), Some(&json!("letter")));
        assert_eq!(options.base_level, Some(0));
        assert_eq!(options.fragments, vec!["ts-links", "ts-code"]);
        assert_eq!(options.slot_directives.len(), 1);
        assert!(!options.promote_title);
    }

    #[test]
    fn test_invalid_flags() {
        let config = TexsmithConfig::default();
        let bad_slot = BuildFlags {
            slots: vec!["nocolon".to_string()],
            ..BuildFlags::default()
        };
        assert!(build_options(&config, &DiscoveryRoots::default(), &bad_slot).is_err());

        let bad_level = BuildFlags {
            base_level: Some("chapterette".to_string()),
            ..BuildFlags::default()
        };
        assert!(build_options(&config, &DiscoveryRoots::default(), &bad_level).is_err());
    }
}
