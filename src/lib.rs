#![forbid(unsafe_code)]

//! @acp:module "TeXSmith Library"
//! @acp:summary "Markdown to LaTeX through templates with slots, fragments, attributes and partials"
//! @acp:domain core
//! @acp:layer api
//! @acp:stability experimental
//!
//! # TeXSmith
//!
//! Converts Markdown documents into LaTeX build directories.
//!
//! ## Features
//!
//! - **Attributes**: owned declarations resolved over overrides, front matter,
//!   emitters and defaults
//! - **Slots**: route whole documents or heading sections into template slots
//! - **Heading offsets**: sectioning depth computed per routed fragment
//! - **Partials and fragments**: one provider per construct, conflicts are errors
//! - **Discovery**: builtin, installed, local and home template tiers
//!
//! ## Example
//!
//! ```rust,no_run
//! use texsmith::{BuildAssembler, BuildOptions, Document, TracingSink};
//!
//! fn main() -> anyhow::Result<()> {
//!     let document = Document::from_file("paper.md".as_ref())?;
//!     let report = BuildAssembler::new(BuildOptions::default())
//!         .build(&[document], &TracingSink)?;
//!     println!("wrote {}", report.output);
//!     Ok(())
//! }
//! ```

pub mod attributes;
pub mod bibliography;
pub mod build;
pub mod commands;
pub mod config;
pub mod converters;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod fragments;
pub mod headings;
pub mod partials;
pub mod render;
pub mod slots;
pub mod templates;

// Re-exports
pub use attributes::{
    AttributeDeclaration, AttributeOwner, AttributeRegistry, AttributeResolver, AttributeSpec, AttributeType,
    ResolvedAttributeSet, ValueOrigin,
};
pub use bibliography::{Bibliography, ReferenceSet};
pub use build::{BuildAssembler, BuildOptions, BuildReport, PreparedBuild};
pub use config::TexsmithConfig;
pub use converters::{ConverterRegistry, DiagramArtifact, DiagramConverter};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, NullSink, Severity, TracingSink};
pub use document::{parse_markdown, Block, Document, Heading, Node};
pub use error::{Result, TexsmithError};
pub use fragments::{Fragment, FragmentManifest, FragmentSet};
pub use headings::OffsetPlan;
pub use partials::{PartialResolver, PartialSet, PartialSource};
pub use slots::{SlotDeclaration, SlotDirective, SlotRouter, SlotSet};
pub use templates::{
    list_templates, load_template, locate_template, DiscoveryRoots, LoadedTemplate, TemplateManifest, TemplateTier,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
