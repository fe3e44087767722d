//! @acp:module "Output Formatting"
//! @acp:summary "Console diagnostic sink and shared CLI argument helpers"
//! @acp:domain cli
//! @acp:layer utility

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::document::Document;

/// @acp:summary "Prints diagnostics to stderr with console styling"
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    /// Also print info-level events
    pub verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let marker = match diagnostic.severity {
            Severity::Info if !self.verbose => return,
            Severity::Info => style("ℹ").dim(),
            Severity::Warning => style("⚠").yellow(),
            Severity::Error => style("✗").red(),
        };
        let component = diagnostic
            .component
            .as_deref()
            .map(|c| format!("{}: ", c))
            .unwrap_or_default();
        eprintln!(
            "{} {} {}{}",
            marker,
            style(format!("[{}]", diagnostic.code)).dim(),
            component,
            diagnostic.message
        );
    }
}

/// Parse `key=value`. The value is read as a YAML scalar or list, so
/// `12pt` stays a string while `true` and `[a, b]` become typed values.
pub fn parse_attribute(input: &str) -> Result<(String, Value)> {
    let (key, raw) = input
        .split_once('=')
        .with_context(|| format!("attribute '{}' must be written as key=value", input))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("attribute '{}' has an empty name", input);
    }
    let value = if raw.trim().is_empty() {
        Value::String(String::new())
    } else {
        match serde_yaml::from_str::<Value>(raw) {
            Ok(Value::Object(_)) | Err(_) => Value::String(raw.to_string()),
            Ok(value) => value,
        }
    };
    Ok((key.to_string(), value))
}

/// Read every input document, in command-line order.
pub fn load_documents(inputs: &[PathBuf]) -> Result<Vec<Document>> {
    if inputs.is_empty() {
        anyhow::bail!("no input documents given");
    }
    inputs
        .iter()
        .map(|path| Document::from_file(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect()
}

/// File stem used for batch output directories.
pub fn input_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_attribute_values() {
        assert_eq!(parse_attribute("fontsize=12pt").unwrap(), ("fontsize".to_string(), json!("12pt")));
        assert_eq!(parse_attribute("toc=true").unwrap(), ("toc".to_string(), json!(true)));
        assert_eq!(parse_attribute("authors=[Ada, Bob]").unwrap(), ("authors".to_string(), json!(["Ada", "Bob"])));
        assert_eq!(parse_attribute("subtitle=").unwrap(), ("subtitle".to_string(), json!("")));
        assert_eq!(parse_attribute("title=a: b").unwrap().1, json!("a: b"));
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }

    #[test]
    fn test_input_stem() {
        assert_eq!(input_stem(Path::new("docs/paper.md")), "paper");
    }
}
