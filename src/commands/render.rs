//! @acp:module "Render Command"
//! @acp:summary "Assemble LaTeX build directories from Markdown inputs"
//! @acp:domain cli
//! @acp:layer handler

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use console::style;
use rayon::prelude::*;

use super::output::{input_stem, load_documents, ConsoleSink};
use super::{build_options, BuildFlags};
use crate::build::{BuildAssembler, BuildReport};
use crate::config::TexsmithConfig;
use crate::templates::DiscoveryRoots;

/// Options for the render command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub inputs: Vec<PathBuf>,
    pub flags: BuildFlags,
    /// Render each input as its own build under `<output>/<stem>/`
    pub batch: bool,
    /// Print build reports as JSON
    pub json: bool,
    pub verbose: bool,
}

/// Execute the render command
pub fn execute_render(options: RenderOptions, config: &TexsmithConfig, roots: &DiscoveryRoots) -> Result<()> {
    let build = build_options(config, roots, &options.flags)?;
    let sink = ConsoleSink::new(options.verbose);

    let reports: Vec<(PathBuf, BuildReport)> = if options.batch {
        // Each input owns its output directory
        let mut claimed: HashMap<String, &PathBuf> = HashMap::new();
        for input in &options.inputs {
            let stem = input_stem(input);
            if let Some(previous) = claimed.insert(stem.clone(), input) {
                bail!(
                    "{} and {} would both render into {}",
                    previous.display(),
                    input.display(),
                    build.output_dir.join(&stem).display()
                );
            }
        }

        // Independent builds, nothing shared but the discovery cache
        options
            .inputs
            .par_iter()
            .map(|input| -> Result<(PathBuf, BuildReport)> {
                let mut single = build.clone();
                single.output_dir = build.output_dir.join(input_stem(input));
                let documents = load_documents(std::slice::from_ref(input))?;
                let report = BuildAssembler::new(single.clone())
                    .build(&documents, &sink)
                    .with_context(|| format!("Failed to render {}", input.display()))?;
                Ok((single.output_dir, report))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        let documents = load_documents(&options.inputs)?;
        let report = BuildAssembler::new(build.clone())
            .build(&documents, &sink)
            .context("Failed to render")?;
        vec![(build.output_dir.clone(), report)]
    };

    if options.json {
        let reports: Vec<&BuildReport> = reports.iter().map(|(_, report)| report).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for (dir, report) in &reports {
        println!(
            "{} {} ({} template, {} tier)",
            style("✓").green(),
            dir.join(&report.output).display(),
            report.template,
            report.tier
        );
        if !report.fragments.is_empty() {
            println!("  Fragments: {}", report.fragments.join(", "));
        }
        let filled: Vec<String> = report
            .slots
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(slot, count)| format!("{} ({})", slot, count))
            .collect();
        println!("  Slots: {}", filled.join(", "));
        if !report.artifacts.is_empty() {
            println!("  Diagrams: {}", report.artifacts.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn roots(dir: &TempDir) -> DiscoveryRoots {
        DiscoveryRoots {
            cwd: dir.path().to_path_buf(),
            ..DiscoveryRoots::default()
        }
    }

    #[test]
    fn test_batch_renders_each_input_separately() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.md");
        let second = dir.path().join("two.md");
        fs::write(&first, "# One\n\n## A\n\nText.\n").unwrap();
        fs::write(&second, "# Two\n\n## B\n\nText.\n").unwrap();

        let options = RenderOptions {
            inputs: vec![first, second],
            flags: BuildFlags {
                output: Some(dir.path().join("out")),
                ..BuildFlags::default()
            },
            batch: true,
            json: true,
            verbose: false,
        };
        execute_render(options, &TexsmithConfig::default(), &roots(&dir)).unwrap();

        let one = fs::read_to_string(dir.path().join("out/one/template.tex")).unwrap();
        let two = fs::read_to_string(dir.path().join("out/two/template.tex")).unwrap();
        assert!(one.contains("\\title{One}") && one.contains("\\section{A}"));
        assert!(two.contains("\\title{Two}") && two.contains("\\section{B}"));
    }

    #[test]
    fn test_batch_rejects_inputs_sharing_a_stem() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        let first = dir.path().join("a/paper.md");
        let second = dir.path().join("b/paper.md");
        fs::write(&first, "# One\n").unwrap();
        fs::write(&second, "# Two\n").unwrap();

        let options = RenderOptions {
            inputs: vec![first, second],
            flags: BuildFlags {
                output: Some(dir.path().join("out")),
                ..BuildFlags::default()
            },
            batch: true,
            ..RenderOptions::default()
        };
        let err = execute_render(options, &TexsmithConfig::default(), &roots(&dir)).unwrap_err();
        assert!(err.to_string().contains("would both render into"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let options = RenderOptions {
            inputs: vec![dir.path().join("absent.md")],
            ..RenderOptions::default()
        };
        assert!(execute_render(options, &TexsmithConfig::default(), &roots(&dir)).is_err());
    }
}
