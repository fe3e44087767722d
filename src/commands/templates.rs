//! @acp:module "Templates Command"
//! @acp:summary "List discoverable templates and show manifest summaries"
//! @acp:domain cli
//! @acp:layer handler

use anyhow::Result;
use console::style;
use serde_json::json;

use crate::templates::{list_templates, load_template, locate_template, DiscoveryRoots, LoadedTemplate};

/// Templates subcommands
#[derive(Debug, Clone)]
pub enum TemplatesSubcommand {
    List,
    Info { name: String },
}

/// Execute a templates subcommand
pub fn execute_templates(subcommand: TemplatesSubcommand, roots: &DiscoveryRoots, json: bool) -> Result<()> {
    match subcommand {
        TemplatesSubcommand::List => list(roots, json),
        TemplatesSubcommand::Info { name } => {
            let template = load_template(&locate_template(&name, roots)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&describe(&template))?);
            } else {
                print_info(&template);
            }
            Ok(())
        }
    }
}

fn list(roots: &DiscoveryRoots, json: bool) -> Result<()> {
    let listings = list_templates(roots);
    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    println!("{}", style("Templates").bold());
    for listing in &listings {
        let location = listing
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(bundled)".to_string());
        if listing.shadowed {
            println!(
                "  {} {} {}",
                style(&listing.name).dim(),
                style(format!("[{}, shadowed]", listing.tier)).dim(),
                style(location).dim()
            );
        } else {
            println!("  {} {} {}", style(&listing.name).cyan(), style(format!("[{}]", listing.tier)).dim(), location);
        }
    }
    Ok(())
}

/// JSON summary of a loaded template.
fn describe(template: &LoadedTemplate) -> serde_json::Value {
    let manifest = &template.manifest;
    json!({
        "name": manifest.name,
        "version": manifest.version,
        "description": manifest.description,
        "tier": template.tier,
        "path": template.root.path(),
        "entrypoint": manifest.entrypoint,
        "engines": manifest.engines,
        "slots": template.slots.iter().collect::<Vec<_>>(),
        "default_slot": template.slots.default_name(),
        "attributes": manifest.attributes,
        "fragments": manifest.fragments,
        "partials": manifest.partials.keys().collect::<Vec<_>>(),
        "required_partials": manifest.required_partials,
    })
}

fn print_info(template: &LoadedTemplate) {
    let manifest = &template.manifest;
    println!(
        "{} {} {}",
        style(&manifest.name).bold(),
        manifest.version.as_deref().unwrap_or("-"),
        style(format!("[{}]", template.tier)).dim()
    );
    if let Some(description) = &manifest.description {
        println!("  {}", description);
    }
    if let Some(path) = template.root.path() {
        println!("  Path: {}", path.display());
    }
    if !manifest.engines.is_empty() {
        println!("  Engines: {}", manifest.engines.join(", "));
    }

    println!("\n{}", style("Slots").bold());
    for slot in template.slots.iter() {
        let mut notes = vec![format!("base {}", slot.base_level)];
        if slot.default {
            notes.push("default".to_string());
        }
        if slot.strip_heading {
            notes.push("strips heading".to_string());
        }
        if slot.offset != 0 {
            notes.push(format!("offset {}", slot.offset));
        }
        println!("  {} ({})", style(&slot.name).cyan(), notes.join(", "));
    }

    if !manifest.attributes.is_empty() {
        println!("\n{}", style("Attributes").bold());
        for (name, spec) in &manifest.attributes {
            let default = spec.default.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
            println!("  {} = {}", style(name).cyan(), default);
        }
    }

    if !manifest.fragments.is_empty() {
        println!("\n{} {}", style("Fragments:").bold(), manifest.fragments.join(", "));
    }
    if !manifest.partials.is_empty() {
        let names: Vec<&String> = manifest.partials.keys().collect();
        println!(
            "{} {}",
            style("Partial overrides:").bold(),
            names.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{builtin, ComponentRoot, TemplateTier};

    #[test]
    fn test_describe_builtin_article() {
        let template = LoadedTemplate::load(
            ComponentRoot::Builtin(builtin::template("article").unwrap()),
            TemplateTier::Builtin,
        )
        .unwrap();
        let summary = describe(&template);
        assert_eq!(summary["default_slot"], "mainmatter");
        assert_eq!(summary["tier"], "builtin");
        assert!(summary["attributes"].get("fontsize").is_some());
        assert_eq!(summary["slots"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_template_errors() {
        let roots = DiscoveryRoots::default();
        let err = execute_templates(TemplatesSubcommand::Info { name: "nope".into() }, &roots, true);
        assert!(err.is_err());
    }
}
