//! @acp:module "Attributes Command"
//! @acp:summary "Print the resolved attribute set without rendering"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;

use super::output::{load_documents, ConsoleSink};
use super::{build_options, BuildFlags};
use crate::attributes::ValueOrigin;
use crate::build::BuildAssembler;
use crate::config::TexsmithConfig;
use crate::templates::DiscoveryRoots;

/// Options for the attributes command
#[derive(Debug, Clone, Default)]
pub struct AttributesOptions {
    pub inputs: Vec<PathBuf>,
    pub flags: BuildFlags,
    /// Include where each value came from
    pub origins: bool,
    pub verbose: bool,
}

/// Execute the attributes command
pub fn execute_attributes(options: AttributesOptions, config: &TexsmithConfig, roots: &DiscoveryRoots) -> Result<()> {
    let build = build_options(config, roots, &options.flags)?;
    let documents = load_documents(&options.inputs)?;
    let sink = ConsoleSink::new(options.verbose);

    let resolved = BuildAssembler::new(build)
        .resolve_attributes(&documents, &sink)
        .context("Failed to resolve attributes")?;

    if options.origins {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&resolved.to_context())?);
    }

    let unset: Vec<&String> = resolved
        .iter()
        .filter(|(_, attribute)| attribute.origin == ValueOrigin::Unset)
        .map(|(name, _)| name)
        .collect();
    if !unset.is_empty() && options.verbose {
        eprintln!(
            "{} no value for: {}",
            style("ℹ").dim(),
            unset.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    Ok(())
}
