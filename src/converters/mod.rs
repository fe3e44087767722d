//! @acp:module "Diagram Converters"
//! @acp:summary "Pluggable diagram conversion with placeholder fallback"
//! @acp:domain render
//! @acp:layer integration
//!
//! Converters return artifacts in memory. The build assembler writes them,
//! so a failed render never leaves converted files behind.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Code block languages treated as diagrams.
pub const DIAGRAM_LANGUAGES: &[&str] = &["mermaid", "drawio"];

/// @acp:summary "A converted diagram ready to be written into the build"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramArtifact {
    /// File name relative to the build directory
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// @acp:summary "External diagram converter"
pub trait DiagramConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Code block languages this converter accepts.
    fn languages(&self) -> &[&str];

    /// Convert diagram source into an artifact named after `stem`.
    fn convert(&self, source: &str, stem: &str) -> Result<DiagramArtifact, String>;
}

/// @acp:summary "Language to converter lookup"
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: BTreeMap<String, Arc<dyn DiagramConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for every language the converter accepts. Later registrations replace earlier ones.
    pub fn register(&mut self, converter: Arc<dyn DiagramConverter>) {
        for language in converter.languages() {
            self.converters.insert(language.to_string(), Arc::clone(&converter));
        }
    }

    pub fn get(&self, language: &str) -> Option<&Arc<dyn DiagramConverter>> {
        self.converters.get(language)
    }

    /// Whether a code block language should go through diagram conversion.
    pub fn is_diagram(&self, language: &str) -> bool {
        DIAGRAM_LANGUAGES.contains(&language) || self.converters.contains_key(language)
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("languages", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}
