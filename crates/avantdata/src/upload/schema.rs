//! Field mapping inference and incremental diffing.
//!
//! A sample of documents is unified into one representative document, from
//! which a properties mapping (field name to type descriptor) is derived.
//! When a template already exists remotely, [`diff`] finds the fields the
//! local sample adds and [`merge_fields`] folds their descriptors into the
//! remote properties.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::document::Document;

/// Reserved timestamp field present in every top-level mapping.
pub const TIMESTAMP_FIELD: &str = "GenerateTime";

/// Date format accepted by the backend for date fields.
pub const DATE_FORMAT: &str = "yyyy/MM/dd HH:mm:ss||epoch_millis";

/// Caller-supplied type for a field.
///
/// A name maps to a descriptor (`date` and `int` are shorthands, anything
/// else becomes `{"type": name}`); a mapping is used verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOverride {
    /// Type name such as `date`, `int`, `keyword` or `long`.
    Named(String),
    /// Raw descriptor.
    Mapping(Map<String, Value>),
}

impl FieldOverride {
    /// Descriptor for this override.
    pub fn descriptor(&self) -> Value {
        match self {
            FieldOverride::Mapping(map) => Value::Object(map.clone()),
            FieldOverride::Named(name) => match name.as_str() {
                "date" => date_descriptor(),
                "int" => json!({"type": "integer"}),
                other => json!({"type": other}),
            },
        }
    }
}

impl From<&str> for FieldOverride {
    fn from(name: &str) -> Self {
        FieldOverride::Named(name.to_string())
    }
}

/// Field overrides keyed by field name. They apply at every nesting level.
pub type Overrides = BTreeMap<String, FieldOverride>;

/// Full-text field with a `keyword` sub-field.
pub fn text_descriptor() -> Value {
    json!({
        "type": "text",
        "fields": {
            "keyword": {
                "type": "keyword",
                "ignore_above": 256
            }
        },
        "analyzer": "WS"
    })
}

/// Date field in the backend's accepted formats.
pub fn date_descriptor() -> Value {
    json!({
        "type": "date",
        "format": DATE_FORMAT
    })
}

/// Null, empty strings, empty lists and empty mappings carry no type.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Empty values plus `false` and numeric zero.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        other => is_empty_value(other),
    }
}

/// Unifies a sample into one representative document.
///
/// Keys appear in first-seen order. Each key takes the first value found
/// across the sample that is neither empty, `false` nor zero; mapping values
/// are merged across the whole sample by recursive union instead. Keys with
/// no such value anywhere are dropped.
pub fn unify(documents: &[Document]) -> Document {
    let mut unified = Map::new();
    for document in documents {
        for key in document.keys() {
            if !unified.contains_key(key) {
                unified.insert(key.clone(), Value::Null);
            }
        }
    }

    for (key, slot) in unified.iter_mut() {
        for document in documents {
            let Some(value) = document.get(key) else {
                continue;
            };
            if is_falsy(value) {
                continue;
            }
            if let (Value::Object(target), Value::Object(source)) = (&mut *slot, value) {
                union_into(target, source);
                continue;
            }
            *slot = value.clone();
            if !value.is_object() {
                break;
            }
        }
    }

    unified.retain(|_, slot| !slot.is_null());
    unified
}

/// Recursive union: existing non-empty leaves win, nested mappings merge.
fn union_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(inner)), Value::Object(other)) => union_into(inner, other),
            (Some(existing), _) if !is_empty_value(existing) => {}
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Descriptor inferred for a single value.
pub fn descriptor_for(value: &Value, custom: &Overrides) -> Value {
    match value {
        Value::Object(map) => json!({ "properties": generate_properties(map, custom, false) }),
        Value::Array(items) if items.iter().all(Value::is_object) => json!({"type": "object"}),
        _ => text_descriptor(),
    }
}

/// Properties mapping for a unified document.
///
/// Overrides win over inference. With `with_timestamp`, the reserved
/// timestamp field is added as a date unless the document already has it.
pub fn generate_properties(document: &Document, custom: &Overrides, with_timestamp: bool) -> Document {
    let mut properties = Map::with_capacity(document.len() + 1);
    for (key, value) in document {
        let descriptor = match custom.get(key) {
            Some(field) => field.descriptor(),
            None => descriptor_for(value, custom),
        };
        properties.insert(key.clone(), descriptor);
    }
    if with_timestamp && !properties.contains_key(TIMESTAMP_FIELD) {
        properties.insert(TIMESTAMP_FIELD.to_string(), date_descriptor());
    }
    properties
}

/// Shorthand for [`unify`] followed by [`generate_properties`].
pub fn infer_properties(documents: &[Document], custom: &Overrides) -> Document {
    generate_properties(&unify(documents), custom, true)
}

/// Nested `properties` of a descriptor, if it is an object descriptor.
fn nested(descriptor: &Value) -> Option<&Map<String, Value>> {
    descriptor.get("properties").and_then(Value::as_object)
}

/// Type name of a descriptor. Object descriptors report `object`.
fn type_name(descriptor: &Value) -> Option<&str> {
    if nested(descriptor).is_some() {
        return Some("object");
    }
    descriptor.get("type").and_then(Value::as_str)
}

/// Flattens a properties mapping to dotted field paths and type names.
///
/// Nested `properties` wrappers collapse into their parent path.
pub fn flatten_properties(properties: &Document) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    flatten_into(properties, "", &mut flat);
    flat
}

fn flatten_into(properties: &Map<String, Value>, prefix: &str, flat: &mut BTreeMap<String, String>) {
    for (key, descriptor) in properties {
        let path = format!("{}{}", prefix, key);
        match nested(descriptor) {
            Some(inner) => flatten_into(inner, &format!("{}.", path), flat),
            None => {
                let name = type_name(descriptor).unwrap_or("object");
                flat.insert(path, name.to_string());
            }
        }
    }
}

/// A field present on both sides with different types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeConflict {
    /// Dotted field path.
    pub field: String,
    /// Type already in the remote mapping.
    pub remote: String,
    /// Type inferred from the local sample.
    pub local: String,
}

/// Result of comparing local properties against remote ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Dotted paths of fields missing remotely.
    pub new_fields: Vec<String>,
    /// Descriptors for the missing fields, nested like the properties.
    pub additions: Document,
    /// Fields whose types disagree. Container types are not compared.
    pub conflicts: Vec<TypeConflict>,
}

impl SchemaDiff {
    /// True when the remote mapping already covers every local field.
    pub fn is_empty(&self) -> bool {
        self.new_fields.is_empty()
    }
}

/// Compares local properties against remote ones by key presence,
/// recursing into object fields present on both sides.
pub fn diff(remote: &Document, local: &Document) -> SchemaDiff {
    let mut result = SchemaDiff::default();
    result.additions = diff_level(remote, local, "", &mut result.new_fields, &mut result.conflicts);
    result
}

fn diff_level(
    remote: &Map<String, Value>,
    local: &Map<String, Value>,
    prefix: &str,
    new_fields: &mut Vec<String>,
    conflicts: &mut Vec<TypeConflict>,
) -> Map<String, Value> {
    let mut additions = Map::new();
    for (key, local_descriptor) in local {
        let path = format!("{}{}", prefix, key);
        let Some(remote_descriptor) = remote.get(key) else {
            new_fields.push(path);
            additions.insert(key.clone(), local_descriptor.clone());
            continue;
        };

        if let (Some(remote_inner), Some(local_inner)) = (nested(remote_descriptor), nested(local_descriptor)) {
            let inner = diff_level(remote_inner, local_inner, &format!("{}.", path), new_fields, conflicts);
            if !inner.is_empty() {
                additions.insert(key.clone(), json!({ "properties": inner }));
            }
            continue;
        }

        match (type_name(remote_descriptor), type_name(local_descriptor)) {
            (Some(r), Some(l)) if r != l && r != "object" && l != "object" => {
                conflicts.push(TypeConflict {
                    field: path,
                    remote: r.to_string(),
                    local: l.to_string(),
                });
            }
            _ => {}
        }
    }
    additions
}

/// Merges `additions` into `properties`, descending into object fields.
pub fn merge_fields(properties: &mut Document, additions: &Document) {
    for (key, descriptor) in additions {
        let target = properties
            .get_mut(key)
            .and_then(|existing| existing.get_mut("properties"))
            .and_then(Value::as_object_mut);
        match (target, nested(descriptor)) {
            (Some(inner), Some(added)) => merge_fields(inner, added),
            _ => {
                properties.insert(key.clone(), descriptor.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
