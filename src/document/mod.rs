//! @acp:module "Document Model"
//! @acp:summary "Parsed document tree consumed by slot routing and rendering"
//! @acp:domain core
//! @acp:layer model
//!
//! The core only reads heading levels, heading text and block subtrees.
//! Parsing is delegated to [`markdown`], which is the single place that
//! talks to the external Markdown library.

pub mod frontmatter;
pub mod markdown;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

pub use frontmatter::{lookup_path, split_front_matter};
pub use markdown::parse_markdown;

/// @acp:summary "A heading with its nesting level (1..6)"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        let text = text.into();
        let id = slugify(&text);
        Self { level, text, id }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// @acp:summary "Block and inline content nodes"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Paragraph(Vec<Node>),
    Text(String),
    Bold(Vec<Node>),
    Italic(Vec<Node>),
    Code(String),
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    Link {
        url: String,
        children: Vec<Node>,
    },
    Image {
        url: String,
        alt: String,
    },
    List {
        ordered: bool,
        items: Vec<Vec<Node>>,
    },
    BlockQuote(Vec<Node>),
    Citation(String),
    LineBreak,
    SoftBreak,
    Rule,
    /// Passed through verbatim
    RawLatex(String),
    /// HTML embedded in the Markdown source
    RawHtml { html: String, block: bool },
    /// A construct with no LaTeX mapping; only its text survives
    Unsupported { kind: String, text: String },
}

impl Node {
    /// Plain text content, used for heading titles and image alt text.
    pub fn plain_text(&self) -> String {
        match self {
            Node::Text(text) | Node::Code(text) => text.clone(),
            Node::Paragraph(children)
            | Node::Bold(children)
            | Node::Italic(children)
            | Node::BlockQuote(children)
            | Node::Link { children, .. } => plain_text_of(children),
            Node::Image { alt, .. } => alt.clone(),
            Node::SoftBreak | Node::LineBreak => " ".to_string(),
            Node::Citation(key) => format!("@{}", key),
            Node::CodeBlock { code, .. } => code.clone(),
            Node::List { items, .. } => items
                .iter()
                .map(|item| plain_text_of(item))
                .collect::<Vec<_>>()
                .join(" "),
            Node::Unsupported { text, .. } => text.clone(),
            Node::Rule | Node::RawLatex(_) | Node::RawHtml { .. } => String::new(),
        }
    }
}

pub fn plain_text_of(nodes: &[Node]) -> String {
    nodes.iter().map(Node::plain_text).collect()
}

/// @acp:summary "One top-level entry of a document body"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(Heading),
    Content(Node),
}

impl Block {
    pub fn as_heading(&self) -> Option<&Heading> {
        match self {
            Block::Heading(heading) => Some(heading),
            Block::Content(_) => None,
        }
    }
}

/// @acp:summary "A parsed input document with its front matter"
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: Option<PathBuf>,
    /// Always a JSON object (possibly empty)
    pub front_matter: Value,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            path: None,
            front_matter: Value::Object(Map::new()),
            blocks,
        }
    }

    pub fn with_front_matter(mut self, front_matter: Value) -> Self {
        self.front_matter = front_matter;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read and parse a Markdown file from disk.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let document = parse_markdown(&source)?;
        Ok(document.with_path(path))
    }

    /// Human-readable name for diagnostics.
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string())
    }

    /// Front matter value at a dotted path.
    pub fn meta(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.front_matter, path)
    }

    pub fn headings(&self) -> impl Iterator<Item = &Heading> {
        self.blocks.iter().filter_map(Block::as_heading)
    }
}

/// Heading identifier derived from its text: lowercase, alphanumerics kept,
/// everything else collapsed into single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
