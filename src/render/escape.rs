//! @acp:module "LaTeX Escaping"
//! @acp:summary "Escapes free text for safe inclusion in LaTeX source"
//! @acp:domain render
//! @acp:layer utility

use serde_json::Value;

/// Escape the ten LaTeX special characters.
pub fn latex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '$' => out.push_str("\\$"),
            '&' => out.push_str("\\&"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '%' => out.push_str("\\%"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape every string inside a JSON value, recursing into lists and mappings.
pub fn latex_escape_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(latex_escape(s)),
        Value::Array(items) => Value::Array(items.iter().map(latex_escape_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), latex_escape_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
