//! JSON encoding of a scope's module list.
//!
//! ```json
//! { "modules": [
//!     { "type": "CacheModule",
//!       "parameters": [ { "name": "capacity", "value": "64" } ],
//!       "properties": [ { "name": "verbose", "value": "true" } ] } ] }
//! ```

use super::{Binding, ModuleDeclaration};
use crate::errors::ConfigError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

#[derive(Serialize)]
struct DocumentOut<'a> {
    modules: Vec<ModuleOut<'a>>,
}

#[derive(Serialize)]
struct ModuleOut<'a> {
    #[serde(rename = "type")]
    type_name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<BindingOut<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<BindingOut<'a>>,
}

#[derive(Serialize)]
struct BindingOut<'a> {
    name: &'a str,
    value: &'a str,
}

fn bindings_out(bindings: &[Binding]) -> Vec<BindingOut<'_>> {
    bindings
        .iter()
        .map(|b| BindingOut {
            name: &b.name,
            value: &b.value,
        })
        .collect()
}

/// Parses a module document.
///
/// Blank input is an empty list. Elements without a string `type` are
/// skipped; a binding without both `name` and `value` is an error. Values
/// are kept as literals and only converted when the module is activated.
pub fn parse(raw: &str) -> Result<Vec<ModuleDeclaration>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Value =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidDocument(e.to_string()))?;
    let root = document
        .as_object()
        .ok_or_else(|| ConfigError::InvalidDocument("root is not an object".to_string()))?;

    let elements = match root.get("modules") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(elements)) => elements,
        Some(_) => {
            return Err(ConfigError::InvalidDocument(
                "'modules' is not an array".to_string(),
            ))
        }
    };

    let mut modules = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let Some(type_name) = element.get("type").and_then(Value::as_str) else {
            tracing::debug!(index, "skipping module element without a type");
            continue;
        };
        let parameters = parse_bindings(type_name, element.get("parameters"), "parameter")?;
        let properties = parse_bindings(type_name, element.get("properties"), "property")?;
        modules.push(ModuleDeclaration::from_parts(
            type_name.to_string(),
            parameters,
            properties,
        ));
    }

    Ok(modules)
}

fn parse_bindings(
    module: &str,
    collection: Option<&Value>,
    kind: &'static str,
) -> Result<Vec<Binding>, ConfigError> {
    let items = match collection {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ConfigError::InvalidDocument(format!(
                "{} collection of module '{}' is not an array",
                kind, module
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let name = item.get("name").and_then(Value::as_str);
            let value = item.get("value").and_then(Value::as_str);
            match (name, value) {
                (Some(name), Some(value)) => Ok(Binding::new(name, value)),
                _ => Err(ConfigError::MalformedBinding {
                    module: module.to_string(),
                    collection: kind,
                    index,
                }),
            }
        })
        .collect()
}

/// Serializes declarations to the document format read by [`parse`].
pub fn serialize(modules: &[ModuleDeclaration]) -> String {
    let document = DocumentOut {
        modules: modules
            .iter()
            .map(|m| ModuleOut {
                type_name: m.type_name(),
                parameters: bindings_out(m.parameters()),
                properties: bindings_out(m.properties()),
            })
            .collect(),
    };
    // Only string fields; serializing cannot fail.
    serde_json::to_string(&document).unwrap_or_else(|_| String::from("{\"modules\":[]}"))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `None` for anything that is not a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
