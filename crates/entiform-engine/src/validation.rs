//! Structural and field validation of parsed entity documents
//!
//! Every finding is non-fatal: the record is still emitted with its error
//! list, and schema derivation is withheld while the list is non-empty.

use entiform_core::entity::{number_value, string_field};
use entiform_core::{FieldType, ValidationError, REQUIRED_ENTITY_KEYS};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Date shorthand accepted in place of a regex pattern
pub const DATE_SHORTHAND: &str = "YYYY-MM-DD";

/// Explicit 4-2-2 digit date pattern the shorthand normalizes to
pub const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

/// Check required top-level keys and the shape of `fields`
pub fn validate_structure(root: &Map<String, Value>) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = REQUIRED_ENTITY_KEYS
        .iter()
        .filter(|key| !root.contains_key(**key))
        .map(|key| ValidationError::structural(format!("missing: {}", key)))
        .collect();

    match root.get("fields").and_then(Value::as_array) {
        None => errors.push(ValidationError::structural("fields must be array")),
        Some(fields) if fields.is_empty() => {
            errors.push(ValidationError::structural("fields array empty"))
        }
        Some(_) => {}
    }

    errors
}

/// Check every field entry independently
///
/// Returns nothing when `fields` is not an array; the structural pass
/// already reports that.
pub fn validate_fields(root: &Map<String, Value>) -> Vec<ValidationError> {
    let Some(fields) = root.get("fields").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut errors = Vec::new();
    let mut seen_codes = HashSet::new();

    for (index, entry) in fields.iter().enumerate() {
        let Some(field) = entry.as_object() else {
            errors.push(ValidationError::field(format!("field[{}]: not object", index)));
            continue;
        };

        let code = string_field(field, "code");
        if code.is_empty() {
            errors.push(ValidationError::field(format!("field[{}]: missing code", index)));
            continue;
        }

        if !seen_codes.insert(code) {
            errors.push(ValidationError::field(format!("duplicate field code: {}", code)));
        }

        let field_type = match string_field(field, "type").parse::<FieldType>() {
            Ok(field_type) => field_type,
            Err(e) => {
                errors.push(ValidationError::field(format!("field {}: {}", code, e)));
                continue;
            }
        };

        if let Some(pattern) = field.get("pattern").and_then(Value::as_str).filter(|p| !p.is_empty()) {
            if let Err(message) = validate_pattern(pattern) {
                errors.push(ValidationError::field(format!("field {}: {}", code, message)));
            }
        }

        if let Some(min) = number_value(field, "min") {
            for message in validate_bounds(min, number_value(field, "max"), field_type) {
                errors.push(ValidationError::field(format!("field {}: {}", code, message)));
            }
        }

        match field_type {
            FieldType::Enum => {
                let result = match field.get("values").and_then(Value::as_array) {
                    Some(values) => validate_enum_values(values),
                    None => Err("enum requires values array".to_string()),
                };
                if let Err(message) = result {
                    errors.push(ValidationError::field(format!("field {}: {}", code, message)));
                }
            }
            FieldType::String | FieldType::Number | FieldType::Integer | FieldType::Boolean => {}
        }
    }

    errors
}

/// Accept the date shorthand or any compilable regex
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern == DATE_SHORTHAND {
        return Ok(());
    }

    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| format!("invalid regex pattern: {}", e))
}

/// Pattern as it appears in the derived schema
pub fn normalize_pattern(pattern: &str) -> &str {
    if pattern == DATE_SHORTHAND {
        DATE_PATTERN
    } else {
        pattern
    }
}

/// Bounds are lengths for strings, so a string minimum cannot be negative
pub fn validate_bounds(min: f64, max: Option<f64>, field_type: FieldType) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if max.is_some_and(|max| min > max) {
        errors.push("min cannot be greater than max");
    }

    if field_type == FieldType::String && min < 0.0 {
        errors.push("min cannot be negative for string");
    }

    errors
}

/// Enum values must be a non-empty list of strings
pub fn validate_enum_values(values: &[Value]) -> Result<(), String> {
    if values.is_empty() {
        return Err("enum requires values array".to_string());
    }

    match values.iter().position(|v| !v.is_string()) {
        Some(index) => Err(format!("enum value at index {} is not a string", index)),
        None => Ok(()),
    }
}
