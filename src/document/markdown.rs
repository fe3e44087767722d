//! @acp:module "Markdown Intake"
//! @acp:summary "Converts comrak's CommonMark AST into the crate's document model"
//! @acp:domain core
//! @acp:layer parser

use std::cell::RefCell;
use std::sync::OnceLock;

use comrak::arena_tree::Node as ArenaNode;
use comrak::nodes::{Ast, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};
use regex::Regex;

use super::frontmatter::split_front_matter;
use super::{plain_text_of, Block, Document, Heading, Node};
use crate::error::Result;

type AstNode<'a> = ArenaNode<'a, RefCell<Ast>>;

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[@([A-Za-z0-9_:.\-]+)\]").expect("valid citation regex"))
}

fn heading_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\{#([A-Za-z0-9_:.\-]+)\}\s*$").expect("valid id regex"))
}

/// Parse a Markdown source (with optional front matter) into a [`Document`].
pub fn parse_markdown(source: &str) -> Result<Document> {
    let (front_matter, body) = split_front_matter(source)?;

    let arena = Arena::new();
    let options = Options::default();
    let root = parse_document(&arena, body, &options);

    let mut blocks = Vec::new();
    for child in root.children() {
        if let Some(block) = convert_top_level(child) {
            blocks.push(block);
        }
    }

    Ok(Document::new(blocks).with_front_matter(front_matter))
}

fn convert_top_level<'a>(node: &'a AstNode<'a>) -> Option<Block> {
    let level = match &node.data.borrow().value {
        NodeValue::Heading(heading) => Some(heading.level),
        _ => None,
    };

    match level {
        Some(level) => Some(Block::Heading(convert_heading(node, level))),
        None => convert_block(node).map(Block::Content),
    }
}

fn convert_heading<'a>(node: &'a AstNode<'a>, level: u8) -> Heading {
    let text = plain_text_of(&convert_inlines(node));
    let re = heading_id_regex();
    match re.captures(&text) {
        Some(caps) => {
            let id = caps[1].to_string();
            let stripped = re.replace(&text, "").trim().to_string();
            Heading::new(level, stripped).with_id(id)
        }
        None => Heading::new(level, text.trim()),
    }
}

fn convert_blocks<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    node.children().filter_map(convert_block).collect()
}

fn convert_block<'a>(node: &'a AstNode<'a>) -> Option<Node> {
    let ast = node.data.borrow();
    match &ast.value {
        NodeValue::Paragraph => Some(Node::Paragraph(convert_inlines(node))),
        // Nested headings (inside quotes or lists) carry no structure
        NodeValue::Heading(_) => Some(Node::Paragraph(vec![Node::Bold(convert_inlines(node))])),
        NodeValue::CodeBlock(code_block) => {
            let info = code_block.info.to_string();
            let language = info
                .split_whitespace()
                .next()
                .map(str::to_string)
                .filter(|l| !l.is_empty());
            Some(Node::CodeBlock {
                language,
                code: code_block.literal.to_string(),
            })
        }
        NodeValue::BlockQuote => Some(Node::BlockQuote(convert_blocks(node))),
        NodeValue::List(list) => {
            let ordered = matches!(list.list_type, ListType::Ordered);
            let items = node.children().map(|item| convert_blocks(item)).collect();
            Some(Node::List { ordered, items })
        }
        NodeValue::ThematicBreak => Some(Node::Rule),
        NodeValue::HtmlBlock(html) => Some(Node::RawHtml {
            html: html.literal.to_string(),
            block: true,
        }),
        NodeValue::Table(..) => Some(unsupported(node, "table")),
        NodeValue::FootnoteDefinition(..) => Some(unsupported(node, "footnote definition")),
        _ => Some(unsupported(node, "block")),
    }
}

fn unsupported<'a>(node: &'a AstNode<'a>, kind: &str) -> Node {
    let words: Vec<String> = node
        .descendants()
        .filter_map(|child| match &child.data.borrow().value {
            NodeValue::Text(text) => Some(text.to_string()),
            NodeValue::Code(code) => Some(code.literal.to_string()),
            _ => None,
        })
        .collect();
    Node::Unsupported {
        kind: kind.to_string(),
        text: words.join(" "),
    }
}

fn convert_inlines<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    let mut raw = Vec::new();
    for child in node.children() {
        convert_inline(child, &mut raw);
    }
    split_citations(merge_text(raw))
}

fn convert_inline<'a>(node: &'a AstNode<'a>, out: &mut Vec<Node>) {
    let ast = node.data.borrow();
    match &ast.value {
        NodeValue::Text(text) => out.push(Node::Text(text.to_string())),
        NodeValue::SoftBreak => out.push(Node::SoftBreak),
        NodeValue::LineBreak => out.push(Node::LineBreak),
        NodeValue::Code(code) => out.push(Node::Code(code.literal.to_string())),
        NodeValue::Emph => out.push(Node::Italic(convert_inlines(node))),
        NodeValue::Strong => out.push(Node::Bold(convert_inlines(node))),
        NodeValue::Link(link) => out.push(Node::Link {
            url: link.url.to_string(),
            children: convert_inlines(node),
        }),
        NodeValue::Image(link) => out.push(Node::Image {
            url: link.url.to_string(),
            alt: plain_text_of(&convert_inlines(node)),
        }),
        NodeValue::HtmlInline(html) => out.push(Node::RawHtml {
            html: html.to_string(),
            block: false,
        }),
        _ => {
            for child in node.children() {
                convert_inline(child, out);
            }
        }
    }
}

/// comrak splits bracketed text into several text nodes.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(Node::Text(previous)), Node::Text(next)) => previous.push_str(&next),
            (_, node) => merged.push(node),
        }
    }
    merged
}

fn split_citations(nodes: Vec<Node>) -> Vec<Node> {
    let re = citation_regex();
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let text = match node {
            Node::Text(text) => text,
            other => {
                out.push(other);
                continue;
            }
        };
        let mut last = 0;
        for caps in re.captures_iter(&text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > last {
                out.push(Node::Text(text[last..whole.start()].to_string()));
            }
            out.push(Node::Citation(caps[1].to_string()));
            last = whole.end();
        }
        if last < text.len() {
            out.push(Node::Text(text[last..].to_string()));
        }
    }
    out
}
