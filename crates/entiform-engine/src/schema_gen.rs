//! JSON Schema derivation for valid entity documents
//!
//! Produces one object schema per entity: a property per field, shaped by
//! the field's type, with `additionalProperties: false`. Output is a pure
//! function of the parsed tree.

use crate::validation::{normalize_pattern, DATE_SHORTHAND};
use entiform_core::entity::string_field;
use entiform_core::{Field, FieldType, JSON_SCHEMA_DIALECT};
use serde_json::{json, Map, Value};

/// Schema derivation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("fields not found or not an array")]
    MissingFields,
}

/// Derive the object schema for an entity root
pub fn derive_schema(root: &Map<String, Value>) -> Result<Value, SchemaError> {
    let entries = root
        .get("fields")
        .and_then(Value::as_array)
        .ok_or(SchemaError::MissingFields)?;

    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in entries.iter().filter_map(Value::as_object).map(Field::from_map) {
        if field.required {
            required.push(Value::String(field.code.clone()));
        }
        properties.insert(field.code.clone(), Value::Object(field_schema(&field)));
    }

    let mut schema = Map::new();
    schema.insert("$schema".into(), json!(JSON_SCHEMA_DIALECT));
    schema.insert("$id".into(), json!(schema_id(root)));
    schema.insert("type".into(), json!("object"));
    schema.insert("title".into(), json!(string_field(root, "name")));
    schema.insert("additionalProperties".into(), json!(false));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), Value::Array(required));

    if let Some(examples) = root.get("examples").and_then(Value::as_array).filter(|e| !e.is_empty()) {
        schema.insert("examples".into(), Value::Array(examples.clone()));
    }

    Ok(Value::Object(schema))
}

/// `/module/object/code/schema.json`
pub fn schema_id(root: &Map<String, Value>) -> String {
    format!(
        "/{}/{}/{}/schema.json",
        string_field(root, "module"),
        string_field(root, "object"),
        string_field(root, "code"),
    )
}

/// Property schema for one field
///
/// A field without a recognized type falls back to a plain string.
pub fn field_schema(field: &Field) -> Map<String, Value> {
    let mut schema = Map::new();

    match field.field_type {
        Some(FieldType::String) | None => string_schema(field, &mut schema),
        Some(FieldType::Number) => number_schema(field, &mut schema),
        Some(FieldType::Integer) => integer_schema(field, &mut schema),
        Some(FieldType::Boolean) => boolean_schema(field, &mut schema),
        Some(FieldType::Enum) => enum_schema(field, &mut schema),
    }

    if let Some(name) = &field.name {
        schema.insert("title".into(), json!(name));
    }
    if let Some(description) = &field.description {
        schema.insert("description".into(), json!(description));
    }
    if let Some(examples) = &field.examples {
        schema.insert("examples".into(), Value::Array(examples.clone()));
    }

    schema
}

fn string_schema(field: &Field, schema: &mut Map<String, Value>) {
    schema.insert("type".into(), json!("string"));

    if field.field_type.is_none() {
        return;
    }

    if let Some(pattern) = &field.pattern {
        if pattern == DATE_SHORTHAND {
            schema.insert("format".into(), json!("date"));
        }
        schema.insert("pattern".into(), json!(normalize_pattern(pattern)));
    }
    // Lengths are never negative; such a bound is dropped
    if let Some(min) = field.min.filter(|m| *m >= 0.0) {
        schema.insert("minLength".into(), json!(min as u64));
    }
    if let Some(max) = field.max.filter(|m| *m >= 0.0) {
        schema.insert("maxLength".into(), json!(max as u64));
    }
    if let Some(default) = non_empty_string(&field.default) {
        schema.insert("default".into(), default);
    }
}

fn number_schema(field: &Field, schema: &mut Map<String, Value>) {
    schema.insert("type".into(), json!("number"));

    if let Some(min) = field.min {
        schema.insert("minimum".into(), Value::from(min));
    }
    if let Some(max) = field.max {
        schema.insert("maximum".into(), Value::from(max));
    }
    if let Some(step) = field.multiple_of {
        schema.insert("multipleOf".into(), Value::from(step));
    }
    if let Some(default) = field.default.as_ref().and_then(Value::as_f64) {
        schema.insert("default".into(), Value::from(default));
    }
}

fn integer_schema(field: &Field, schema: &mut Map<String, Value>) {
    schema.insert("type".into(), json!("integer"));

    if let Some(min) = field.min {
        schema.insert("minimum".into(), json!(min as i64));
    }
    if let Some(max) = field.max {
        schema.insert("maximum".into(), json!(max as i64));
    }
    if let Some(step) = field.multiple_of {
        schema.insert("multipleOf".into(), Value::from(step));
    }
    if let Some(default) = field.default.as_ref().and_then(integer_default) {
        schema.insert("default".into(), json!(default));
    }
}

fn boolean_schema(field: &Field, schema: &mut Map<String, Value>) {
    schema.insert("type".into(), json!("boolean"));

    let default = match &field.default {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => s.parse::<bool>().ok(),
        _ => None,
    };
    if let Some(default) = default {
        schema.insert("default".into(), json!(default));
    }
}

fn enum_schema(field: &Field, schema: &mut Map<String, Value>) {
    schema.insert("type".into(), json!("string"));

    if let Some(values) = field.values.as_ref().filter(|v| !v.is_empty()) {
        schema.insert("enum".into(), Value::Array(values.clone()));
    }
    if let Some(default) = non_empty_string(&field.default) {
        schema.insert("default".into(), default);
    }
}

/// Integer defaults accept whole numbers, truncated floats and numeric strings
fn integer_default(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_string(value: &Option<Value>) -> Option<Value> {
    value
        .as_ref()
        .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
        .cloned()
}
