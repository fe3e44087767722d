//! @acp:module "Errors"
//! @acp:summary "Error taxonomy for attribute, slot, partial and template resolution"
//! @acp:domain core
//! @acp:layer model
//!
//! Every variant is a configuration or content error. None of them are
//! transient, so nothing in the crate retries on them.

use std::path::PathBuf;

use thiserror::Error;

/// @acp:summary "Library result alias"
pub type Result<T> = std::result::Result<T, TexsmithError>;

/// @acp:summary "All errors produced by the resolution and build pipeline"
#[derive(Debug, Error)]
pub enum TexsmithError {
    #[error("attribute '{name}' is declared by both {first} and {second}")]
    OwnerConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("attribute '{name}' (declared by {owner}) expects {expected}, got {received}")]
    AttributeType {
        name: String,
        owner: String,
        expected: String,
        received: String,
    },

    #[error("attribute '{name}' is required by {owner} but no value was provided")]
    AttributeMissing { name: String, owner: String },

    #[error("unknown slot '{slot}' for template '{template}' (declared: {})", .declared.join(", "))]
    UnknownSlot {
        slot: String,
        template: String,
        declared: Vec<String>,
    },

    #[error("partial '{partial}' is provided by several fragments: {}", .providers.join(", "))]
    PartialConflict {
        partial: String,
        providers: Vec<String>,
    },

    #[error("partial '{partial}' is required by {required_by} but has no provider")]
    MissingPartial {
        partial: String,
        required_by: String,
    },

    #[error("template '{name}' not found (searched: {})", .searched.join("; "))]
    TemplateNotFound { name: String, searched: Vec<String> },

    #[error("fragment '{name}' not found (required by template '{template}')")]
    FragmentNotFound { name: String, template: String },

    #[error("invalid slot directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("invalid manifest {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("template error in {origin}: {message}")]
    Template { origin: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl TexsmithError {
    /// Short machine-readable code, used by the build report and the console sink.
    pub fn code(&self) -> &'static str {
        match self {
            TexsmithError::OwnerConflict { .. } => "owner-conflict",
            TexsmithError::AttributeType { .. } => "attribute-type",
            TexsmithError::AttributeMissing { .. } => "attribute-missing",
            TexsmithError::UnknownSlot { .. } => "unknown-slot",
            TexsmithError::PartialConflict { .. } => "partial-conflict",
            TexsmithError::MissingPartial { .. } => "missing-partial",
            TexsmithError::TemplateNotFound { .. } => "template-not-found",
            TexsmithError::FragmentNotFound { .. } => "fragment-not-found",
            TexsmithError::InvalidDirective { .. } => "invalid-directive",
            TexsmithError::Manifest { .. } => "manifest",
            TexsmithError::Template { .. } => "template-syntax",
            TexsmithError::Io(_) => "io",
            TexsmithError::Json(_) => "json",
            TexsmithError::Yaml(_) => "yaml",
            TexsmithError::Toml(_) => "toml",
            TexsmithError::Other(_) => "other",
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TexsmithError::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}
