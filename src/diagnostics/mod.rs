//! @acp:module "Diagnostics"
//! @acp:summary "Pluggable diagnostic sinks for warnings and degraded output"
//! @acp:domain core
//! @acp:layer service
//!
//! Resolution and render entry points take a `&dyn DiagnosticSink` rather
//! than logging to a global. The CLI, tracing and tests observe the same
//! structured stream.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

/// @acp:summary "Severity of a diagnostic event"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// @acp:summary "A single structured diagnostic event"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Machine code such as `converter-missing`
    pub code: String,
    pub message: String,
    /// Template, fragment or document the event originates from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            component: None,
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(component) => write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.code, component, self.message
            ),
            None => write!(f, "{} [{}] {}", self.severity, self.code, self.message),
        }
    }
}

/// @acp:summary "Receiver of diagnostic events"
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// @acp:summary "Forwards diagnostics to tracing"
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let component = diagnostic.component.as_deref().unwrap_or("-");
        match diagnostic.severity {
            Severity::Info => {
                tracing::info!(code = %diagnostic.code, component, "{}", diagnostic.message)
            }
            Severity::Warning => {
                tracing::warn!(code = %diagnostic.code, component, "{}", diagnostic.message)
            }
            Severity::Error => {
                tracing::error!(code = %diagnostic.code, component, "{}", diagnostic.message)
            }
        }
    }
}

/// @acp:summary "Discards every diagnostic"
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}

/// @acp:summary "Records diagnostics for tests and build reports"
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event emitted so far, in emission order.
    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.events().iter().any(|d| d.code == code)
    }

    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|d| d.severity >= severity)
            .count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

/// @acp:summary "Fans a diagnostic out to two sinks"
pub struct TeeSink<'a> {
    first: &'a dyn DiagnosticSink,
    second: &'a dyn DiagnosticSink,
}

impl<'a> TeeSink<'a> {
    pub fn new(first: &'a dyn DiagnosticSink, second: &'a dyn DiagnosticSink) -> Self {
        Self { first, second }
    }
}

impl DiagnosticSink for TeeSink<'_> {
    fn emit(&self, diagnostic: Diagnostic) {
        self.first.emit(diagnostic.clone());
        self.second.emit(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_preserves_order() {
        let sink = CollectingSink::new();
        sink.emit(Diagnostic::warning("a", "first"));
        sink.emit(Diagnostic::info("b", "second"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, "a");
        assert_eq!(events[1].code, "b");
        assert!(sink.has_code("b"));
        assert_eq!(sink.count_at_least(Severity::Warning), 1);
    }

    #[test]
    fn test_tee_sink_reaches_both() {
        let left = CollectingSink::new();
        let right = CollectingSink::new();
        let tee = TeeSink::new(&left, &right);
        tee.emit(Diagnostic::error("x", "boom").with_component("article"));

        assert_eq!(left.events().len(), 1);
        assert_eq!(right.events()[0].component.as_deref(), Some("article"));
    }

    #[test]
    fn test_display_includes_component() {
        let diagnostic = Diagnostic::warning("converter-missing", "no mermaid").with_component("doc.md");
        assert_eq!(
            diagnostic.to_string(),
            "warning [converter-missing] doc.md: no mermaid"
        );
    }
}
