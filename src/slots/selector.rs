//! @acp:module "Slot Selectors"
//! @acp:summary "Parsing of slot:selector directives and subtree extraction"
//! @acp:domain core
//! @acp:layer parser

use std::fmt;

use serde::Serialize;

use crate::document::{slugify, Block, Document};
use crate::error::{Result, TexsmithError};

/// Selector token meaning "the whole document".
pub const WHOLE_DOCUMENT: &str = "*";

/// @acp:summary "What part of the input a directive selects"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Selector {
    /// Every block of the document(s) in scope
    Whole,
    /// Heading identifier, written `#id`
    Id(String),
    /// Nested heading path, written `Part > Chapter`
    HeadingPath(Vec<String>),
    /// A document path or, failing that, a heading text
    Text(String),
}

impl Selector {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == WHOLE_DOCUMENT {
            return Some(Selector::Whole);
        }
        if let Some(id) = trimmed.strip_prefix('#') {
            let id = id.trim();
            return (!id.is_empty()).then(|| Selector::Id(id.to_string()));
        }
        if trimmed.contains('>') {
            let parts: Vec<String> = trimmed
                .split('>')
                .map(|part| part.trim().to_string())
                .collect();
            if parts.iter().any(String::is_empty) {
                return None;
            }
            return Some(Selector::HeadingPath(parts));
        }
        Some(Selector::Text(trimmed.to_string()))
    }

    /// Whether this selector names the given document by path.
    pub fn matches_document(&self, document: &Document) -> bool {
        let (Selector::Text(text), Some(path)) = (self, document.path.as_ref()) else {
            return false;
        };
        let wanted = std::path::Path::new(text);
        path == wanted
            || path.ends_with(wanted)
            || path.file_name().map(|name| name == wanted.as_os_str()).unwrap_or(false)
    }

    /// Locate the selected heading section in `blocks`, returning its block range.
    pub fn find_section(&self, blocks: &[Block]) -> Option<std::ops::Range<usize>> {
        match self {
            Selector::Whole => (!blocks.is_empty()).then(|| 0..blocks.len()),
            Selector::Id(id) => {
                let start = blocks
                    .iter()
                    .position(|b| b.as_heading().map(|h| &h.id == id).unwrap_or(false))?;
                Some(start..section_end(blocks, start))
            }
            Selector::Text(text) => find_heading(blocks, 0..blocks.len(), text),
            Selector::HeadingPath(parts) => {
                let mut range = 0..blocks.len();
                for part in parts {
                    let found = find_heading(blocks, range.clone(), part)?;
                    range = found;
                }
                Some(range)
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Whole => write!(f, "{}", WHOLE_DOCUMENT),
            Selector::Id(id) => write!(f, "#{}", id),
            Selector::HeadingPath(parts) => write!(f, "{}", parts.join(" > ")),
            Selector::Text(text) => write!(f, "{}", text),
        }
    }
}

fn heading_matches(text: &str, wanted: &str) -> bool {
    text.trim().eq_ignore_ascii_case(wanted.trim()) || slugify(text) == slugify(wanted)
}

fn find_heading(blocks: &[Block], within: std::ops::Range<usize>, wanted: &str) -> Option<std::ops::Range<usize>> {
    let end_limit = within.end;
    let start = within.clone().find(|&index| {
        blocks[index]
            .as_heading()
            .map(|h| heading_matches(&h.text, wanted))
            .unwrap_or(false)
    })?;
    Some(start..section_end(blocks, start).min(end_limit))
}

/// A section runs until the next heading at the same or a shallower level.
fn section_end(blocks: &[Block], start: usize) -> usize {
    let Some(level) = blocks[start].as_heading().map(|h| h.level) else {
        return start + 1;
    };
    blocks[start + 1..]
        .iter()
        .position(|b| b.as_heading().map(|h| h.level <= level).unwrap_or(false))
        .map(|offset| start + 1 + offset)
        .unwrap_or(blocks.len())
}

/// @acp:summary "Where a slot directive was declared"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DirectiveOrigin {
    Cli,
    FrontMatter { document: usize },
}

/// @acp:summary "One parsed `slot:selector` directive"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDirective {
    pub slot: String,
    pub selector: Selector,
    pub origin: DirectiveOrigin,
}

impl SlotDirective {
    pub fn new(slot: impl Into<String>, selector: Selector, origin: DirectiveOrigin) -> Self {
        Self {
            slot: slot.into(),
            selector,
            origin,
        }
    }

    /// Parse a CLI directive of the form `slot:selector`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| TexsmithError::InvalidDirective {
            directive: input.to_string(),
            reason: reason.to_string(),
        };
        let (slot, selector) = input
            .split_once(':')
            .ok_or_else(|| invalid("expected 'slot:selector'"))?;
        let slot = slot.trim();
        if slot.is_empty() {
            return Err(invalid("slot name is empty"));
        }
        let selector = Selector::parse(selector).ok_or_else(|| invalid("selector is empty or malformed"))?;
        Ok(Self::new(slot, selector, DirectiveOrigin::Cli))
    }
}

impl fmt::Display for SlotDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.selector)
    }
}
