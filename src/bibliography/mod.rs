//! @acp:module "Bibliography"
//! @acp:summary "Reference lookup for citations, built from front matter"
//! @acp:domain render
//! @acp:layer integration

use indexmap::IndexMap;
use serde_json::Value;

use crate::render::escape::latex_escape;

/// @acp:summary "Citation key lookup used by the LaTeX writer"
pub trait Bibliography: Send + Sync {
    fn contains(&self, key: &str) -> bool;

    /// Human-readable reference text, used when a citation degrades to a footnote.
    fn describe(&self, key: &str) -> Option<String>;
}

/// @acp:summary "References declared in front matter `references: [{id: ..}]`"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    entries: IndexMap<String, Value>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect references from every document, first declaration of an id wins.
    pub fn from_front_matter(front_matter: &[&Value]) -> Self {
        let mut set = Self::new();
        for meta in front_matter {
            let Some(references) = meta.get("references").and_then(Value::as_array) else {
                continue;
            };
            for entry in references {
                let Some(id) = entry.get("id").and_then(Value::as_str) else {
                    tracing::debug!("reference without id ignored");
                    continue;
                };
                set.entries.entry(id.to_string()).or_insert_with(|| entry.clone());
            }
        }
        set
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: Value) {
        self.entries.insert(id.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// BibTeX database with one `@<type>` entry per reference.
    pub fn to_bibtex(&self) -> String {
        let mut out = String::new();
        for (id, entry) in &self.entries {
            let kind = entry.get("type").and_then(Value::as_str).unwrap_or("misc");
            out.push_str(&format!("@{}{{{},\n", kind, id));
            if let Some(fields) = entry.as_object() {
                for (field, value) in fields {
                    if field == "id" || field == "type" {
                        continue;
                    }
                    let text = match value {
                        Value::Array(items) => items
                            .iter()
                            .map(field_text)
                            .collect::<Vec<_>>()
                            .join(" and "),
                        other => field_text(other),
                    };
                    out.push_str(&format!("  {} = {{{}}},\n", field, latex_escape(&text)));
                }
            }
            out.push_str("}\n\n");
        }
        out
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Bibliography for ReferenceSet {
    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn describe(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        let title = entry.get("title").and_then(Value::as_str)?;
        Some(title.to_string())
    }
}
