//! @acp:module "LaTeX Rendering"
//! @acp:summary "Renders routed document content through the resolved partials"
//! @acp:domain render
//! @acp:layer service
//!
//! Each construct goes through exactly one partial. The writer records
//! the constructs it used so conditional fragments can activate.

pub mod engine;
pub mod escape;

use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::bibliography::Bibliography;
use crate::converters::{ConverterRegistry, DiagramArtifact};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::{Block, Heading, Node};
use crate::error::{Result, TexsmithError};
use crate::headings::OffsetPlan;
use crate::partials::{PartialSet, PartialSource};

pub use engine::{render_str, Template};
pub use escape::latex_escape;

/// Escape the characters `\href` and `\includegraphics` cannot take verbatim.
pub fn escape_url(url: &str) -> String {
    url.replace('\\', "/").replace('%', "\\%").replace('#', "\\#")
}

/// @acp:summary "Rendered LaTeX plus what it took to produce it"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub latex: String,
    pub constructs: BTreeSet<String>,
    pub artifacts: Vec<DiagramArtifact>,
}

impl RenderOutput {
    /// Fold another output into this one.
    pub fn absorb(&mut self, other: RenderOutput) {
        self.latex.push_str(&other.latex);
        self.constructs.extend(other.constructs);
        self.artifacts.extend(other.artifacts);
    }
}

/// @acp:summary "Node tree to LaTeX writer for one routed fragment"
pub struct LatexWriter<'a> {
    partials: &'a PartialSet,
    converters: &'a ConverterRegistry,
    bibliography: &'a dyn Bibliography,
    sink: &'a dyn DiagnosticSink,
    plan: OffsetPlan,
    /// Prefix for diagram artifact names, unique per fragment
    artifact_prefix: String,
    output: RenderOutput,
    /// First partial that failed to render
    failure: Option<TexsmithError>,
}

impl<'a> LatexWriter<'a> {
    pub fn new(
        partials: &'a PartialSet,
        converters: &'a ConverterRegistry,
        bibliography: &'a dyn Bibliography,
        sink: &'a dyn DiagnosticSink,
        plan: OffsetPlan,
    ) -> Self {
        Self {
            partials,
            converters,
            bibliography,
            sink,
            plan,
            artifact_prefix: "diagram".to_string(),
            output: RenderOutput::default(),
            failure: None,
        }
    }

    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artifact_prefix = prefix.into();
        self
    }

    /// @acp:summary "Render a fragment's blocks"
    pub fn render(mut self, blocks: &[Block]) -> Result<RenderOutput> {
        let mut latex = String::new();
        for block in blocks {
            match block {
                Block::Heading(heading) => latex.push_str(&self.heading(heading)),
                Block::Content(node) => latex.push_str(&self.node(node)),
            }
        }
        if let Some(err) = self.failure {
            return Err(err);
        }
        self.output.latex = latex;
        Ok(self.output)
    }

    fn apply(&mut self, construct: &str, context: Value) -> String {
        self.output.constructs.insert(construct.to_string());
        match self.partials.get(construct) {
            Some(partial) => match partial.render(&context) {
                Ok(latex) => latex,
                Err(err) => {
                    self.failure.get_or_insert(err);
                    String::new()
                }
            },
            None => {
                tracing::debug!(construct, "no partial, emitting content verbatim");
                context
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            }
        }
    }

    fn heading(&mut self, heading: &Heading) -> String {
        let (depth, command) = self.plan.command_for(heading, self.sink);
        let title = latex_escape(&heading.text);
        self.apply(
            "heading",
            json!({
                "command": command,
                "depth": depth,
                "level": heading.level,
                "title": title,
                "label": heading.id,
            }),
        )
    }

    fn nodes(&mut self, nodes: &[Node]) -> String {
        nodes.iter().map(|node| self.node(node)).collect()
    }

    fn node(&mut self, node: &Node) -> String {
        match node {
            Node::Paragraph(children) => {
                let content = self.nodes(children);
                self.apply("paragraph", json!({ "content": content }))
            }
            Node::Text(text) => self.apply("text", json!({ "text": latex_escape(text) })),
            Node::Bold(children) => {
                let content = self.nodes(children);
                self.apply("bold", json!({ "content": content }))
            }
            Node::Italic(children) => {
                let content = self.nodes(children);
                self.apply("italic", json!({ "content": content }))
            }
            Node::Code(code) => self.apply("code", json!({ "text": latex_escape(code) })),
            Node::CodeBlock { language, code } => self.code_block(language.as_deref(), code),
            Node::Link { url, children } => {
                let content = self.nodes(children);
                self.apply("link", json!({ "url": escape_url(url), "content": content }))
            }
            Node::Image { url, alt } => self.apply(
                "image",
                json!({ "url": escape_url(url), "alt": latex_escape(alt) }),
            ),
            Node::List { ordered, items } => {
                let mut rendered = String::new();
                for item in items {
                    let content = self.nodes(item);
                    rendered.push_str(&self.apply("item", json!({ "content": content.trim_end() })));
                }
                let environment = if *ordered { "enumerate" } else { "itemize" };
                self.apply(
                    "list",
                    json!({ "environment": environment, "ordered": ordered, "items": rendered }),
                )
            }
            Node::BlockQuote(children) => {
                let content = self.nodes(children);
                self.apply("blockquote", json!({ "content": content }))
            }
            Node::Citation(key) => self.citation(key),
            Node::LineBreak => self.apply("linebreak", json!({})),
            Node::SoftBreak => "\n".to_string(),
            Node::Rule => self.apply("rule", json!({})),
            Node::RawLatex(latex) => latex.clone(),
            Node::RawHtml { html, block } => {
                if self.partials.source("raw_html") == Some(&PartialSource::Core) {
                    self.sink.emit(
                        Diagnostic::warning(
                            "content-dropped",
                            format!("raw HTML has no LaTeX rendering: {}", html.trim()),
                        )
                        .with_component("render"),
                    );
                }
                self.apply("raw_html", json!({ "html": html, "block": block }))
            }
            Node::Unsupported { kind, text } => {
                self.sink.emit(
                    Diagnostic::warning(
                        "content-dropped",
                        format!("{} is not supported, only its text is kept", kind),
                    )
                    .with_component("render"),
                );
                self.apply("paragraph", json!({ "content": latex_escape(text) }))
            }
        }
    }

    fn code_block(&mut self, language: Option<&str>, code: &str) -> String {
        let language = language.unwrap_or_default();
        if !language.is_empty() && self.converters.is_diagram(language) {
            return self.diagram(language, code);
        }
        self.apply("codeblock", json!({ "language": language, "code": code }))
    }

    fn diagram(&mut self, language: &str, code: &str) -> String {
        let stem = format!("{}-{}", self.artifact_prefix, self.output.artifacts.len() + 1);
        let converted = match self.converters.get(language) {
            Some(converter) => converter.convert(code, &stem).map_err(|reason| {
                format!("converter '{}' failed on {} diagram: {}", converter.name(), language, reason)
            }),
            None => Err(format!("no converter registered for {} diagrams", language)),
        };

        match converted {
            Ok(artifact) => {
                let path = artifact.file_name.clone();
                self.output.artifacts.push(artifact);
                self.apply("diagram", json!({ "path": path, "language": language }))
            }
            Err(message) => {
                self.sink
                    .emit(Diagnostic::warning("converter-missing", message).with_component("converters"));
                self.apply(
                    "diagram_placeholder",
                    json!({ "language": language, "code": code }),
                )
            }
        }
    }

    fn citation(&mut self, key: &str) -> String {
        if self.bibliography.contains(key) {
            return self.apply("citation", json!({ "key": key }));
        }
        self.sink.emit(
            Diagnostic::warning(
                "citation-missing",
                format!("no bibliography entry for '{}', rendered as a footnote", key),
            )
            .with_component("bibliography"),
        );
        let text = self
            .bibliography
            .describe(key)
            .unwrap_or_else(|| key.to_string());
        self.apply(
            "footnote_citation",
            json!({ "key": key, "text": latex_escape(&text) }),
        )
    }
}
