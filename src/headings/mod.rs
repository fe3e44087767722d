//! @acp:module "Heading Offsets"
//! @acp:summary "Title promotion, heading stripping and per-fragment sectioning depth"
//! @acp:domain core
//! @acp:layer logic
//!
//! Offsets are computed per routed fragment after slot extraction:
//!
//! ```text
//! fragment_offset = 1 - L            (L = shallowest remaining level, 0 if none)
//! effective_base  = slot_base + document_base + fragment_offset + slot_offset
//! depth(h)        = h + effective_base - 1
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::{Block, Heading};

/// LaTeX sectioning commands indexed by depth, starting at `part` (-1).
const COMMANDS: &[&str] = &[
    "part",
    "chapter",
    "section",
    "subsection",
    "subsubsection",
    "paragraph",
    "subparagraph",
];

pub const MIN_DEPTH: i32 = -1;
pub const MAX_DEPTH: i32 = 5;

/// Command for a depth, if it is in range.
pub fn heading_command(depth: i32) -> Option<&'static str> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return None;
    }
    COMMANDS.get((depth - MIN_DEPTH) as usize).copied()
}

/// Parse a base level given as a number or a sectioning command name.
pub fn parse_base_level(input: &str) -> Option<i32> {
    let trimmed = input.trim();
    if let Ok(number) = trimmed.parse::<i32>() {
        return Some(number);
    }
    COMMANDS
        .iter()
        .position(|command| command.eq_ignore_ascii_case(trimmed))
        .map(|index| index as i32 + MIN_DEPTH)
}

/// @acp:summary "Depth arithmetic for one routed fragment"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetPlan {
    pub shallowest: Option<u8>,
    pub fragment_offset: i32,
    pub effective_base: i32,
}

impl OffsetPlan {
    /// @acp:summary "Compute the plan for a fragment's remaining headings"
    pub fn compute(blocks: &[Block], slot_base: i32, document_base: i32, slot_offset: i32) -> Self {
        let shallowest = blocks.iter().filter_map(Block::as_heading).map(|h| h.level).min();
        let fragment_offset = shallowest.map(|level| 1 - i32::from(level)).unwrap_or(0);
        Self {
            shallowest,
            fragment_offset,
            effective_base: slot_base + document_base + fragment_offset + slot_offset,
        }
    }

    /// Unclamped depth for a heading level.
    pub fn depth_of(&self, level: u8) -> i32 {
        i32::from(level) + self.effective_base - 1
    }

    /// Heading level to effective depth, for every level present.
    pub fn level_map(&self, blocks: &[Block]) -> BTreeMap<u8, i32> {
        blocks
            .iter()
            .filter_map(Block::as_heading)
            .map(|h| (h.level, self.depth_of(h.level)))
            .collect()
    }

    /// Sectioning command for a heading, clamped into range with a warning.
    pub fn command_for(&self, heading: &Heading, sink: &dyn DiagnosticSink) -> (i32, &'static str) {
        let depth = self.depth_of(heading.level);
        let clamped = depth.clamp(MIN_DEPTH, MAX_DEPTH);
        if clamped != depth {
            sink.emit(
                Diagnostic::warning(
                    "heading-depth-clamped",
                    format!(
                        "heading '{}' would render at depth {}, clamped to {}",
                        heading.text, depth, clamped
                    ),
                )
                .with_component("headings"),
            );
        }
        // Clamped into range, so the lookup cannot miss
        let command = heading_command(clamped).unwrap_or("subparagraph");
        (clamped, command)
    }
}

/// Remove the first heading when it is uniquely the shallowest one.
///
/// Callers decide whether promotion applies at all (enabled, no declared title).
pub fn promote_title(blocks: &mut Vec<Block>) -> Option<Heading> {
    let (first_index, first_level) = blocks
        .iter()
        .enumerate()
        .find_map(|(index, block)| block.as_heading().map(|h| (index, h.level)))?;

    let shallower_or_tied = blocks
        .iter()
        .filter_map(Block::as_heading)
        .filter(|h| h.level <= first_level)
        .count();
    if shallower_or_tied != 1 {
        tracing::debug!(level = first_level, "first heading is not uniquely shallowest, no promotion");
        return None;
    }

    match blocks.remove(first_index) {
        Block::Heading(heading) => Some(heading),
        Block::Content(_) => None,
    }
}

/// Drop the first heading without promoting it.
pub fn strip_first_heading(blocks: &mut Vec<Block>) -> Option<Heading> {
    let index = blocks.iter().position(|block| block.as_heading().is_some())?;
    match blocks.remove(index) {
        Block::Heading(heading) => Some(heading),
        Block::Content(_) => None,
    }
}
