//! Entity model: files, fingerprints, fields and identity keys

use crate::diagnostic::{FatalError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;

/// Top-level keys every entity document must carry
pub const REQUIRED_ENTITY_KEYS: [&str; 6] = ["module", "object", "property", "code", "name", "fields"];

/// A candidate entity document found by the package scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFile {
    /// Path to the document
    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl EntityFile {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }

    /// Path rendered for messages and output
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// 64-bit xxHash of a file's raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentFingerprint(pub u64);

impl ContentFingerprint {
    /// Fingerprint raw bytes
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh64::xxh64(bytes, 0))
    }

    /// 16-digit lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Closed set of field types
///
/// Adding a variant forces every exhaustive match (validation, schema
/// shape, default coercion) to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Enum,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        Self::String,
        Self::Number,
        Self::Integer,
        Self::Boolean,
        Self::Enum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized field type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type '{0}'")]
pub struct UnknownFieldType(pub String);

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownFieldType(s.to_string()))
    }
}

/// Typed view of one field entry
///
/// Built leniently from the structural tree: wrongly typed values read as
/// absent. Validation reports on the tree itself, this view only feeds
/// schema derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Identifier, unique within the entity
    pub code: String,

    /// Human name
    pub name: Option<String>,

    /// Declared type (None when missing or unrecognized)
    pub field_type: Option<FieldType>,

    /// Regex pattern or the `YYYY-MM-DD` shorthand
    pub pattern: Option<String>,

    pub required: bool,

    /// Lower bound (length for strings, value for numbers)
    pub min: Option<f64>,

    /// Upper bound (length for strings, value for numbers)
    pub max: Option<f64>,

    pub multiple_of: Option<f64>,

    /// Allowed values for enum fields
    pub values: Option<Vec<Value>>,

    /// Raw default, coerced per type during schema derivation
    pub default: Option<Value>,

    pub description: Option<String>,

    pub examples: Option<Vec<Value>>,
}

impl Field {
    pub fn from_map(entry: &Map<String, Value>) -> Self {
        let string_at = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        // `multipleOf` wins when both spellings are present
        let multiple_of = number_value(entry, "multipleOf").or_else(|| number_value(entry, "multiple_of"));

        Self {
            code: string_at("code").unwrap_or_default(),
            name: string_at("name"),
            field_type: entry
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| t.parse().ok()),
            pattern: string_at("pattern"),
            required: entry.get("required").and_then(Value::as_bool).unwrap_or(false),
            min: number_value(entry, "min"),
            max: number_value(entry, "max"),
            multiple_of,
            values: entry.get("values").and_then(Value::as_array).cloned(),
            default: entry.get("default").cloned(),
            description: string_at("description"),
            examples: entry
                .get("examples")
                .and_then(Value::as_array)
                .filter(|a| !a.is_empty())
                .cloned(),
        }
    }
}

/// Read a numeric value that may be written as a number or numeric string
///
/// Non-finite strings such as `inf` or `NaN` read as absent.
pub fn number_value(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Read a top-level string, treating anything else as empty
pub fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Package-wide identity `module.object.property.code`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub module: String,
    pub object: String,
    pub property: String,
    pub code: String,
}

impl EntityKey {
    pub fn new(
        module: impl Into<String>,
        object: impl Into<String>,
        property: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            object: object.into(),
            property: property.into(),
            code: code.into(),
        }
    }

    /// Build from the top-level keys of a parsed document
    pub fn from_tree(root: &Map<String, Value>) -> Self {
        Self::new(
            string_field(root, "module"),
            string_field(root, "object"),
            string_field(root, "property"),
            string_field(root, "code"),
        )
    }

    /// All four components empty; such keys are never registered
    pub fn is_blank(&self) -> bool {
        self.module.is_empty() && self.object.is_empty() && self.property.is_empty() && self.code.is_empty()
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.module, self.object, self.property, self.code)
    }
}

/// Outcome of processing one entity file
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEntity {
    /// Source file
    pub file: EntityFile,

    /// Fingerprint of the raw bytes
    pub fingerprint: ContentFingerprint,

    /// Parsed structural tree (None after a fatal error)
    pub tree: Option<Value>,

    /// Derived schema (None unless the record is error-free)
    pub schema: Option<Value>,

    /// Ordered non-fatal findings
    pub errors: Vec<ValidationError>,

    /// Fatal error, if processing stopped early
    pub fatal: Option<FatalError>,
}

impl ProcessedEntity {
    pub fn new(file: EntityFile, fingerprint: ContentFingerprint) -> Self {
        Self {
            file,
            fingerprint,
            tree: None,
            schema: None,
            errors: Vec::new(),
            fatal: None,
        }
    }

    /// No fatal error and no findings
    pub fn is_valid(&self) -> bool {
        self.fatal.is_none() && self.errors.is_empty()
    }

    /// Root object of the parsed tree
    pub fn root(&self) -> Option<&Map<String, Value>> {
        self.tree.as_ref().and_then(Value::as_object)
    }

    /// Identity key, when parsed data exists and the key is not blank
    pub fn entity_key(&self) -> Option<EntityKey> {
        if self.fatal.is_some() {
            return None;
        }
        let key = EntityKey::from_tree(self.root()?);
        (!key.is_blank()).then_some(key)
    }

    /// Attach a finding; a record with findings never carries a schema
    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.schema = None;
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}
