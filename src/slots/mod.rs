//! @acp:module "Slots"
//! @acp:summary "Template slot declarations and routing of document content into slots"
//! @acp:domain core
//! @acp:layer service
//!
//! Routing order: CLI directives in command-line order, then front matter
//! directives in document order. A slot named by any CLI directive ignores
//! every front matter directive for that slot. Whatever is left of each
//! document lands in the default slot.

pub mod selector;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::{Block, Document};
use crate::error::{Result, TexsmithError};
use crate::headings::parse_base_level;

pub use selector::{DirectiveOrigin, Selector, SlotDirective, WHOLE_DOCUMENT};

/// Slot used when a template marks none as default.
pub const IMPLICIT_DEFAULT_SLOT: &str = "mainmatter";

/// Base level given either as a depth number or a sectioning command name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    Depth(i32),
    Named(String),
}

/// @acp:summary "Slot as written in a template manifest"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub base_level: Option<LevelSpec>,
    /// Nominal sectioning command, used as base level when none is given
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub offset: i32,
    #[serde(default)]
    pub strip_heading: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// @acp:summary "A named content sink declared by a template"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDeclaration {
    pub name: String,
    pub default: bool,
    pub base_level: i32,
    pub depth: Option<String>,
    pub offset: i32,
    pub strip_heading: bool,
}

impl SlotDeclaration {
    pub fn new(name: impl Into<String>, base_level: i32) -> Self {
        Self {
            name: name.into(),
            default: false,
            base_level,
            depth: None,
            offset: 0,
            strip_heading: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn stripping_heading(mut self) -> Self {
        self.strip_heading = true;
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    fn from_spec(name: &str, spec: &SlotSpec) -> std::result::Result<Self, String> {
        let named_level = |name: &str| {
            parse_base_level(name).ok_or_else(|| format!("unknown sectioning level '{}'", name))
        };
        let base_level = match (&spec.base_level, &spec.depth) {
            (Some(LevelSpec::Depth(depth)), _) => *depth,
            (Some(LevelSpec::Named(level)), _) => named_level(level)?,
            (None, Some(depth)) => named_level(depth)?,
            (None, None) => 0,
        };
        Ok(Self {
            name: name.to_string(),
            default: spec.default,
            base_level,
            depth: spec.depth.clone(),
            offset: spec.offset,
            strip_heading: spec.strip_heading,
        })
    }
}

/// @acp:summary "Validated slot set of one template, with exactly one default"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSet {
    slots: IndexMap<String, SlotDeclaration>,
    default: String,
}

impl SlotSet {
    /// Build from declarations. Several defaults are rejected. With none,
    /// `mainmatter` becomes the default, added at base level 1 if undeclared.
    pub fn new(declarations: Vec<SlotDeclaration>) -> std::result::Result<Self, String> {
        let mut slots = IndexMap::new();
        for declaration in declarations {
            slots.insert(declaration.name.clone(), declaration);
        }

        let defaults: Vec<String> = slots
            .values()
            .filter(|s| s.default)
            .map(|s| s.name.clone())
            .collect();
        let default = match defaults.as_slice() {
            [single] => single.clone(),
            [] => {
                let implicit = slots
                    .entry(IMPLICIT_DEFAULT_SLOT.to_string())
                    .or_insert_with(|| SlotDeclaration::new(IMPLICIT_DEFAULT_SLOT, 1));
                implicit.default = true;
                IMPLICIT_DEFAULT_SLOT.to_string()
            }
            several => {
                return Err(format!("several slots are marked default: {}", several.join(", ")))
            }
        };

        Ok(Self { slots, default })
    }

    pub fn from_specs(specs: &IndexMap<String, SlotSpec>) -> std::result::Result<Self, String> {
        let declarations = specs
            .iter()
            .map(|(name, spec)| SlotDeclaration::from_spec(name, spec))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(declarations)
    }

    pub fn default_slot(&self) -> &SlotDeclaration {
        // The constructor guarantees the default is present
        &self.slots[&self.default]
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn get(&self, name: &str) -> Option<&SlotDeclaration> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.slots.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotDeclaration> {
        self.slots.values()
    }

    /// Fail with `UnknownSlot` unless `name` is declared.
    pub fn validate(&self, name: &str, template: &str) -> Result<&SlotDeclaration> {
        self.slots.get(name).ok_or_else(|| TexsmithError::UnknownSlot {
            slot: name.to_string(),
            template: template.to_string(),
            declared: self.slots.keys().cloned().collect(),
        })
    }
}

/// @acp:summary "Content extracted for one slot from one document"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedFragment {
    pub document: usize,
    /// Directive that selected this content, `None` for default-slot leftovers
    pub selector: Option<String>,
    #[serde(skip)]
    pub blocks: Vec<Block>,
}

/// @acp:summary "Slot name to ordered fragments for one render"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SlotRouting {
    slots: IndexMap<String, Vec<RoutedFragment>>,
}

impl SlotRouting {
    pub fn fragments(&self, slot: &str) -> &[RoutedFragment] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<RoutedFragment>)> {
        self.slots.iter()
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<RoutedFragment>> {
        self.slots
    }

    fn push(&mut self, slot: &str, fragment: RoutedFragment) {
        self.slots.entry(slot.to_string()).or_default().push(fragment);
    }
}

/// Collect `press.slot.<name>` and `press.slots.<name>` directives of one document.
///
/// Values are a selector string or a list of selector strings.
pub fn front_matter_directives(document: &Document, index: usize) -> Result<Vec<SlotDirective>> {
    let mut directives = Vec::new();
    for table in ["press.slot", "press.slots"] {
        let Some(entries) = document.meta(table) else {
            continue;
        };
        let Some(entries) = entries.as_object() else {
            return Err(TexsmithError::InvalidDirective {
                directive: table.to_string(),
                reason: "expected a mapping of slot names to selectors".to_string(),
            });
        };
        for (slot, value) in entries {
            let selectors: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for raw in selectors {
                let text = raw.as_str().ok_or_else(|| TexsmithError::InvalidDirective {
                    directive: format!("{}.{}", table, slot),
                    reason: "selector must be a string".to_string(),
                })?;
                let selector = Selector::parse(text).ok_or_else(|| TexsmithError::InvalidDirective {
                    directive: format!("{}:{}", slot, text),
                    reason: "selector is empty or malformed".to_string(),
                })?;
                directives.push(SlotDirective::new(
                    slot.clone(),
                    selector,
                    DirectiveOrigin::FrontMatter { document: index },
                ));
            }
        }
    }
    Ok(directives)
}

/// @acp:summary "Routes documents into the slots of one template"
pub struct SlotRouter<'s> {
    slots: &'s SlotSet,
    template: &'s str,
}

impl<'s> SlotRouter<'s> {
    pub fn new(slots: &'s SlotSet, template: &'s str) -> Self {
        Self { slots, template }
    }

    /// Effective directive list: CLI first, then front matter for slots the CLI left alone.
    pub fn directives(
        &self,
        documents: &[Document],
        cli: &[SlotDirective],
        sink: &dyn DiagnosticSink,
    ) -> Result<Vec<SlotDirective>> {
        let mut directives: Vec<SlotDirective> = cli.to_vec();
        for (index, document) in documents.iter().enumerate() {
            for directive in front_matter_directives(document, index)? {
                if cli.iter().any(|c| c.slot == directive.slot) {
                    sink.emit(
                        Diagnostic::info(
                            "slot-directive-overridden",
                            format!(
                                "front matter directive '{}' in {} ignored, slot is set on the command line",
                                directive,
                                document.display_name()
                            ),
                        )
                        .with_component("slots"),
                    );
                    continue;
                }
                directives.push(directive);
            }
        }

        // Unknown slots fail before any content is moved
        for directive in &directives {
            self.slots.validate(&directive.slot, self.template)?;
        }
        Ok(directives)
    }

    /// @acp:summary "Extract selected content per directive, leftovers go to the default slot"
    pub fn route(
        &self,
        documents: &[Document],
        cli: &[SlotDirective],
        sink: &dyn DiagnosticSink,
    ) -> Result<SlotRouting> {
        let directives = self.directives(documents, cli, sink)?;
        let mut remaining: Vec<Vec<Block>> = documents.iter().map(|d| d.blocks.clone()).collect();
        let mut routing = SlotRouting::default();

        for directive in &directives {
            let scope: Vec<usize> = match directive.origin {
                DirectiveOrigin::Cli => (0..documents.len()).collect(),
                DirectiveOrigin::FrontMatter { document } => vec![document],
            };

            let extracted = self.apply(directive, documents, &scope, &mut remaining);
            if extracted.is_empty() {
                sink.emit(
                    Diagnostic::warning(
                        "slot-selector-unmatched",
                        format!("selector '{}' matched no content", directive),
                    )
                    .with_component("slots"),
                );
                continue;
            }
            for (document, blocks) in extracted {
                tracing::debug!(slot = %directive.slot, document, blocks = blocks.len(), "routed content");
                routing.push(
                    &directive.slot,
                    RoutedFragment {
                        document,
                        selector: Some(directive.to_string()),
                        blocks,
                    },
                );
            }
        }

        let default = self.slots.default_name();
        for (document, blocks) in remaining.into_iter().enumerate() {
            if blocks.is_empty() {
                continue;
            }
            routing.push(
                default,
                RoutedFragment {
                    document,
                    selector: None,
                    blocks,
                },
            );
        }

        Ok(routing)
    }

    fn apply(
        &self,
        directive: &SlotDirective,
        documents: &[Document],
        scope: &[usize],
        remaining: &mut [Vec<Block>],
    ) -> Vec<(usize, Vec<Block>)> {
        let mut extracted = Vec::new();

        match &directive.selector {
            Selector::Whole => {
                for &index in scope {
                    let blocks = std::mem::take(&mut remaining[index]);
                    if !blocks.is_empty() {
                        extracted.push((index, blocks));
                    }
                }
            }
            selector => {
                let by_path: Vec<usize> = scope
                    .iter()
                    .copied()
                    .filter(|&index| selector.matches_document(&documents[index]))
                    .collect();
                if !by_path.is_empty() {
                    for index in by_path {
                        let blocks = std::mem::take(&mut remaining[index]);
                        if !blocks.is_empty() {
                            extracted.push((index, blocks));
                        }
                    }
                    return extracted;
                }
                // Heading selectors take the first match in scope order
                for &index in scope {
                    if let Some(range) = selector.find_section(&remaining[index]) {
                        let blocks: Vec<Block> = remaining[index].drain(range).collect();
                        extracted.push((index, blocks));
                        break;
                    }
                }
            }
        }

        extracted
    }
}
