//! @acp:module "Front Matter"
//! @acp:summary "YAML front matter splitting and dotted-path metadata lookup"
//! @acp:domain core
//! @acp:layer parser

use serde_json::{Map, Value};

use crate::error::{Result, TexsmithError};

/// Split a leading `---` delimited YAML block from the body.
///
/// Returns the parsed metadata (always an object) and the remaining body.
/// The closing delimiter may be `---` or `...`.
pub fn split_front_matter(source: &str) -> Result<(Value, &str)> {
    let empty = || Value::Object(Map::new());

    let rest = match source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return Ok((empty(), source)),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((parse_yaml_mapping(yaml)?, body));
        }
        offset += line.len();
    }

    // No closing delimiter: not front matter
    Ok((empty(), source))
}

fn parse_yaml_mapping(yaml: &str) -> Result<Value> {
    if yaml.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let value = serde_json::to_value(parsed)?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(TexsmithError::Other(format!(
            "front matter must be a mapping, found {}",
            type_name(&other)
        ))),
    }
}

/// Look up a dotted path (`press.slot.abstract`) inside nested mappings.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Empty means null, an empty string, or a whitespace-only string.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
