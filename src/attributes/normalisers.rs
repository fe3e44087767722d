//! @acp:module "Attribute Normalisers"
//! @acp:summary "Closed registry of named post-coercion value normalisers"
//! @acp:domain core
//! @acp:layer logic
//!
//! A normaliser receives the coerced value and the declared default. The
//! default lets it fall back when the input is not recognised.

use serde_json::Value;

use super::types::EscapeMode;
use crate::render::escape::latex_escape_value;

/// Normaliser signature: `(value, declared default) -> normalised value`.
pub type Normaliser = fn(&Value, &Value) -> Result<Value, String>;

const REGISTRY: &[(&str, Normaliser)] = &[
    ("language", normalise_language),
    ("paper", normalise_paper),
    ("date", normalise_date),
    ("lowercase", normalise_lowercase),
    ("trim", normalise_trim),
];

/// Look up a normaliser by name.
pub fn lookup(name: &str) -> Option<Normaliser> {
    REGISTRY
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, normaliser)| *normaliser)
}

/// Names of every registered normaliser.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

/// Apply an escape mode to an already normalised value.
pub fn apply_escape(mode: EscapeMode, value: Value) -> Value {
    match mode {
        EscapeMode::None => value,
        EscapeMode::Latex => latex_escape_value(&value),
    }
}

const LANGUAGES: &[(&[&str], &str)] = &[
    (&["en", "en-us", "english", "american"], "english"),
    (&["en-gb", "british", "uk"], "british"),
    (&["fr", "fr-fr", "fr-ch", "french", "francais", "français"], "french"),
    (&["de", "de-de", "german", "ngerman", "deutsch"], "ngerman"),
    (&["de-ch", "swissgerman"], "nswissgerman"),
    (&["es", "es-es", "spanish", "espanol", "español"], "spanish"),
    (&["it", "it-it", "italian", "italiano"], "italian"),
    (&["pt", "pt-pt", "portuguese"], "portuguese"),
    (&["pt-br", "brazilian"], "brazilian"),
    (&["nl", "dutch"], "dutch"),
    (&["ru", "russian"], "russian"),
    (&["pl", "polish"], "polish"),
    (&["sv", "swedish"], "swedish"),
    (&["da", "danish"], "danish"),
    (&["fi", "finnish"], "finnish"),
    (&["el", "greek"], "greek"),
];

fn fallback_string(default: &Value, builtin: &str) -> Value {
    match default.as_str() {
        Some(s) if !s.trim().is_empty() => Value::String(s.to_string()),
        _ => Value::String(builtin.to_string()),
    }
}

fn normalise_language(value: &Value, default: &Value) -> Result<Value, String> {
    let Some(raw) = value.as_str() else {
        return Err(format!("language must be a string, got {}", value));
    };
    let key = raw.trim().to_lowercase().replace('_', "-");
    let found = LANGUAGES
        .iter()
        .find(|(aliases, _)| aliases.contains(&key.as_str()))
        .map(|(_, babel)| Value::String(babel.to_string()));
    if let Some(found) = found {
        return Ok(found);
    }
    // Region variants of a known language: "fr-ca" -> "french"
    if let Some((primary, _)) = key.split_once('-') {
        if let Some((_, babel)) = LANGUAGES.iter().find(|(aliases, _)| aliases.contains(&primary)) {
            return Ok(Value::String(babel.to_string()));
        }
    }
    tracing::debug!(language = %raw, "unrecognised language, using default");
    Ok(fallback_string(default, "english"))
}

const PAPERS: &[(&[&str], &str)] = &[
    (&["a4", "a4paper"], "a4paper"),
    (&["a5", "a5paper"], "a5paper"),
    (&["a3", "a3paper"], "a3paper"),
    (&["b5", "b5paper"], "b5paper"),
    (&["letter", "us-letter", "letterpaper"], "letterpaper"),
    (&["legal", "legalpaper"], "legalpaper"),
    (&["executive", "executivepaper"], "executivepaper"),
];

fn normalise_paper(value: &Value, default: &Value) -> Result<Value, String> {
    let Some(raw) = value.as_str() else {
        return Err(format!("paper must be a string, got {}", value));
    };
    let key = raw.trim().to_lowercase().replace([' ', '_'], "-");
    Ok(PAPERS
        .iter()
        .find(|(aliases, _)| aliases.contains(&key.as_str()))
        .map(|(_, paper)| Value::String(paper.to_string()))
        .unwrap_or_else(|| fallback_string(default, "a4paper")))
}

fn normalise_date(value: &Value, _default: &Value) -> Result<Value, String> {
    match value.as_str().map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "today" || s == "now" => Ok(Value::String(
            chrono::Local::now().format("%Y-%m-%d").to_string(),
        )),
        _ => Ok(value.clone()),
    }
}

fn normalise_lowercase(value: &Value, _default: &Value) -> Result<Value, String> {
    Ok(match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other.clone(),
    })
}

fn normalise_trim(value: &Value, _default: &Value) -> Result<Value, String> {
    Ok(match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    })
}
