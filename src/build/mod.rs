//! @acp:module "Build Assembler"
//! @acp:summary "Combines attributes, routed slots, fragments and assets into a build directory"
//! @acp:domain core
//! @acp:layer service
//!
//! A build runs in two phases. `prepare` performs every resolution step and
//! renders everything in memory. `PreparedBuild::write` is the only place
//! that touches the output directory, so a fatal error leaves nothing behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::attributes::{AttributeRegistry, AttributeResolver, ResolvedAttributeSet};
use crate::bibliography::ReferenceSet;
use crate::converters::{ConverterRegistry, DiagramArtifact};
use crate::diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, TeeSink};
use crate::document::{Block, Document};
use crate::error::{Result, TexsmithError};
use crate::fragments::{select_fragment_names, FragmentSet};
use crate::headings::{parse_base_level, promote_title, strip_first_heading, OffsetPlan};
use crate::partials::{PartialResolver, PartialSet};
use crate::render::{LatexWriter, RenderOutput, Template};
use crate::slots::{SlotDirective, SlotRouter};
use crate::templates::{load_template, locate_template, DiscoveryRoots, LoadedTemplate, TemplateTier};

/// Name of the JSON build report written next to the LaTeX output.
pub const REPORT_FILE: &str = "texsmith-build.json";

/// Stem of the generated BibTeX database.
pub const BIBLIOGRAPHY_STEM: &str = "references";

/// @acp:summary "Inputs of one build besides the documents"
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Template name or explicit path
    pub template: String,
    pub output_dir: PathBuf,
    /// Explicit attribute values, highest precedence
    pub overrides: Map<String, Value>,
    pub slot_directives: Vec<SlotDirective>,
    /// Document base level; falls back to front matter `press.base_level`, then 0
    pub base_level: Option<i32>,
    pub promote_title: bool,
    /// Fail when any warning was emitted
    pub strict: bool,
    /// Fragment names appended after the document or template list
    pub fragments: Vec<String>,
    pub roots: DiscoveryRoots,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            template: "article".to_string(),
            output_dir: PathBuf::from("build"),
            overrides: Map::new(),
            slot_directives: Vec::new(),
            base_level: None,
            promote_title: true,
            strict: false,
            fragments: Vec::new(),
            roots: DiscoveryRoots::default(),
        }
    }
}

/// One routed fragment after stripping or promotion, ready to render.
#[derive(Debug, Clone)]
struct ShapedFragment {
    document: usize,
    blocks: Vec<Block>,
    plan: OffsetPlan,
}

/// Everything the attribute phase needs, reused by rendering.
struct Resolution {
    template: Arc<LoadedTemplate>,
    fragments: FragmentSet,
    partials: PartialSet,
    slots: IndexMap<String, Vec<ShapedFragment>>,
    attributes: ResolvedAttributeSet,
}

/// @acp:summary "Summary of a build, written as texsmith-build.json"
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub template: String,
    pub tier: TemplateTier,
    pub output: String,
    /// Slot name -> number of routed fragments
    pub slots: IndexMap<String, usize>,
    /// Active fragments in emission order
    pub fragments: Vec<String>,
    pub attributes: Vec<String>,
    pub artifacts: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// @acp:summary "A fully rendered build that has not been written yet"
#[derive(Debug, Clone)]
pub struct PreparedBuild {
    pub main: String,
    /// Active fragment name -> package body
    pub packages: IndexMap<String, String>,
    /// Destination relative to the build directory -> contents
    pub assets: IndexMap<String, Vec<u8>>,
    pub artifacts: Vec<DiagramArtifact>,
    pub bibtex: Option<String>,
    pub slots: IndexMap<String, String>,
    pub attributes: ResolvedAttributeSet,
    pub report: BuildReport,
}

impl PreparedBuild {
    /// @acp:summary "Write the build directory"
    pub fn write(&self, dir: &Path) -> Result<BuildReport> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(&self.report.output), &self.main)?;

        for (name, body) in &self.packages {
            std::fs::write(dir.join(format!("{}.sty", name)), body)?;
        }
        for (destination, bytes) in &self.assets {
            let target = dir.join(destination);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, bytes)?;
        }
        for artifact in &self.artifacts {
            std::fs::write(dir.join(&artifact.file_name), &artifact.bytes)?;
        }
        if let Some(bibtex) = &self.bibtex {
            std::fs::write(dir.join(format!("{}.bib", BIBLIOGRAPHY_STEM)), bibtex)?;
        }
        std::fs::write(dir.join(REPORT_FILE), serde_json::to_string_pretty(&self.report)?)?;

        tracing::info!(dir = %dir.display(), output = %self.report.output, "build written");
        Ok(self.report.clone())
    }
}

/// @acp:summary "Runs the resolution pipeline for one build"
pub struct BuildAssembler {
    options: BuildOptions,
    converters: ConverterRegistry,
}

impl BuildAssembler {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            converters: ConverterRegistry::new(),
        }
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// @acp:summary "Resolve attributes only, without rendering content"
    pub fn resolve_attributes(&self, documents: &[Document], sink: &dyn DiagnosticSink) -> Result<ResolvedAttributeSet> {
        Ok(self.resolve(documents, sink)?.attributes)
    }

    /// @acp:summary "Resolve and render everything in memory"
    pub fn prepare(&self, documents: &[Document], sink: &dyn DiagnosticSink) -> Result<PreparedBuild> {
        let collector = CollectingSink::new();
        let tee = TeeSink::new(sink, &collector);

        let resolution = self.resolve(documents, &tee)?;
        let template = &resolution.template;
        let front_matter: Vec<&Value> = documents.iter().map(|d| &d.front_matter).collect();
        let references = ReferenceSet::from_front_matter(&front_matter);

        // Render every slot, in template declaration order
        let mut rendered_slots: IndexMap<String, String> = IndexMap::new();
        let mut slot_counts: IndexMap<String, usize> = IndexMap::new();
        let mut combined = RenderOutput::default();
        for (slot, shaped) in &resolution.slots {
            let mut slot_output = RenderOutput::default();
            for (position, fragment) in shaped.iter().enumerate() {
                let output = LatexWriter::new(
                    &resolution.partials,
                    &self.converters,
                    &references,
                    &tee,
                    fragment.plan,
                )
                .with_artifact_prefix(format!("{}-{}", slot, position + 1))
                .render(&fragment.blocks)?;
                tracing::debug!(
                    slot = %slot,
                    document = fragment.document,
                    effective_base = fragment.plan.effective_base,
                    "rendered fragment"
                );
                slot_output.absorb(output);
            }
            slot_counts.insert(slot.clone(), shaped.len());
            rendered_slots.insert(slot.clone(), slot_output.latex.clone());
            combined.absorb(slot_output);
        }

        let active: Vec<&crate::fragments::Fragment> =
            resolution.fragments.active(&combined.constructs, &combined.latex);
        let active_names: Vec<String> = active.iter().map(|f| f.name().to_string()).collect();

        let bibliography = if references.is_empty() {
            String::new()
        } else {
            BIBLIOGRAPHY_STEM.to_string()
        };
        let context = build_context(
            template,
            &resolution.attributes,
            &rendered_slots,
            &active_names,
            &bibliography,
            &tee,
        );

        let packages: IndexMap<String, String> = active
            .iter()
            .map(|fragment| -> Result<(String, String)> {
                Ok((fragment.name().to_string(), fragment.render_package(&context)?))
            })
            .collect::<Result<_>>()?;

        let entrypoint = Template::parse(
            template.root.label(&template.manifest.entrypoint).display().to_string(),
            &template.entrypoint_source,
        )?;
        let main = entrypoint.render(&context)?;

        // Assets are read now so a missing file fails before any write
        let assets = template
            .manifest
            .assets
            .iter()
            .map(|(destination, source)| -> Result<(String, Vec<u8>)> {
                Ok((destination.clone(), template.root.read_bytes(source)?))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        let diagnostics = collector.events();
        let warnings = diagnostics.iter().filter(|d| d.severity >= Severity::Warning).count();
        if self.options.strict && warnings > 0 {
            return Err(TexsmithError::Other(format!(
                "strict mode: {} warning(s) emitted, first: {}",
                warnings,
                diagnostics
                    .iter()
                    .find(|d| d.severity >= Severity::Warning)
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            )));
        }

        let report = BuildReport {
            template: template.name().to_string(),
            tier: template.tier,
            output: template.output_name(),
            slots: slot_counts,
            fragments: active_names,
            attributes: resolution.attributes.names().cloned().collect(),
            artifacts: combined.artifacts.iter().map(|a| a.file_name.clone()).collect(),
            diagnostics,
        };

        tracing::info!(
            template = %report.template,
            fragments = report.fragments.len(),
            warnings,
            "build prepared"
        );

        Ok(PreparedBuild {
            main,
            packages,
            assets,
            artifacts: combined.artifacts,
            bibtex: (!references.is_empty()).then(|| references.to_bibtex()),
            slots: rendered_slots,
            attributes: resolution.attributes,
            report,
        })
    }

    /// @acp:summary "Prepare and write into the configured output directory"
    pub fn build(&self, documents: &[Document], sink: &dyn DiagnosticSink) -> Result<BuildReport> {
        let prepared = self.prepare(documents, sink)?;
        prepared.write(&self.options.output_dir)
    }

    fn resolve(&self, documents: &[Document], sink: &dyn DiagnosticSink) -> Result<Resolution> {
        let location = locate_template(&self.options.template, &self.options.roots)?;
        let template = load_template(&location)?;

        let names = select_fragment_names(documents, &template.manifest.fragments, &self.options.fragments);
        let fragments = FragmentSet::load(&names, &template)?;

        let mut registry = AttributeRegistry::new();
        registry.register_component(&template.owner(), &template.manifest.attributes, &IndexMap::new())?;
        fragments.register_attributes(&mut registry)?;

        let mut partials = PartialResolver::new(template.name());
        for (name, body) in &template.partials {
            partials.template_override(name.clone(), body.clone());
        }
        partials.require(template.owner().to_string(), template.manifest.required_partials.clone());
        fragments.contribute_partials(&mut partials);
        let partials = partials.resolve()?;

        let routing = SlotRouter::new(&template.slots, template.name()).route(
            documents,
            &self.options.slot_directives,
            sink,
        )?;

        let front_matter: Vec<&Value> = documents.iter().map(|d| &d.front_matter).collect();
        let title_declared =
            AttributeResolver::new(&registry).is_supplied("title", &self.options.overrides, &front_matter);
        let mut promoted: Option<String> = None;
        let mut slots: IndexMap<String, Vec<ShapedFragment>> = IndexMap::new();

        for slot in template.slots.iter() {
            let mut shaped = Vec::new();
            for (position, routed) in routing.fragments(&slot.name).iter().enumerate() {
                let mut blocks = routed.blocks.clone();
                if slot.strip_heading {
                    strip_first_heading(&mut blocks);
                } else if slot.default && position == 0 && self.options.promote_title && !title_declared {
                    if let Some(heading) = promote_title(&mut blocks) {
                        tracing::debug!(title = %heading.text, "promoted first heading to title");
                        promoted = Some(heading.text);
                    }
                }
                let document_base = self.document_base(&documents[routed.document])?;
                let plan = OffsetPlan::compute(&blocks, slot.base_level, document_base, slot.offset);
                shaped.push(ShapedFragment {
                    document: routed.document,
                    blocks,
                    plan,
                });
            }
            slots.insert(slot.name.clone(), shaped);
        }

        // The promoted title is the last front matter layer
        let promoted_layer = promoted.map(|title| json!({ "title": title }));
        let mut layers = front_matter;
        if let Some(layer) = &promoted_layer {
            layers.push(layer);
        }
        let attributes = AttributeResolver::new(&registry).resolve(&self.options.overrides, &layers, sink)?;

        Ok(Resolution {
            template,
            fragments,
            partials,
            slots,
            attributes,
        })
    }

    fn document_base(&self, document: &Document) -> Result<i32> {
        if let Some(base) = self.options.base_level {
            return Ok(base);
        }
        match document.meta("press.base_level") {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n.as_i64().map(|n| n as i32).ok_or_else(|| invalid_base_level(document, n)),
            Some(Value::String(s)) => parse_base_level(s).ok_or_else(|| invalid_base_level(document, s)),
            Some(other) => Err(invalid_base_level(document, other)),
        }
    }
}

fn invalid_base_level(document: &Document, value: impl std::fmt::Display) -> TexsmithError {
    TexsmithError::AttributeType {
        name: "press.base_level".to_string(),
        owner: document.display_name(),
        expected: "integer or sectioning command".to_string(),
        received: value.to_string(),
    }
}

/// Placeholder context for the entrypoint and fragment packages.
fn build_context(
    template: &LoadedTemplate,
    attributes: &ResolvedAttributeSet,
    slots: &IndexMap<String, String>,
    fragments: &[String],
    bibliography: &str,
    sink: &dyn DiagnosticSink,
) -> Value {
    let mut context = attributes.to_context();

    let slot_map: Map<String, Value> = slots
        .iter()
        .map(|(name, latex)| (name.clone(), Value::String(latex.clone())))
        .collect();
    for (name, latex) in &slot_map {
        let shadowed = context.insert(name.clone(), latex.clone());
        if shadowed.is_some_and(|value| !value.is_null()) {
            sink.emit(
                Diagnostic::warning(
                    "slot-shadows-attribute",
                    format!("attribute '{}' is hidden by the slot of the same name", name),
                )
                .with_component(template.name()),
            );
        }
    }
    context.insert("slots".to_string(), Value::Object(slot_map));

    let preamble: Vec<String> = fragments.iter().map(|name| format!("\\usepackage{{{}}}", name)).collect();
    context.insert("fragments".to_string(), json!(fragments));
    context.insert("fragment_preamble".to_string(), Value::String(preamble.join("\n")));
    context.insert("bibliography".to_string(), Value::String(bibliography.to_string()));
    context.insert(
        "template".to_string(),
        json!({
            "name": template.manifest.name,
            "version": template.manifest.version,
        }),
    );

    Value::Object(context)
}
