//! Error classes and per-file failures
//!
//! IMPORTANT: Error class codes are part of the persisted output.
//! NEVER rename or remove codes - add new ones only.

use serde::{Deserialize, Serialize};

/// Error class registry (v1)
///
/// These codes are STABLE. Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// The entity file could not be read
    IoError,

    /// The source text could not be converted to a structural tree
    TranscodeError,

    /// Missing top-level keys, or a malformed/empty `fields` sequence
    StructuralError,

    /// Missing or duplicate field code, bad type, pattern, bounds or enum values
    FieldError,

    /// The entity key is already claimed by another file in the package
    ConflictError,

    /// Schema derivation failed
    SchemaError,
}

impl ErrorClass {
    /// Get the error class as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoError => "IO_ERROR",
            Self::TranscodeError => "TRANSCODE_ERROR",
            Self::StructuralError => "STRUCTURAL_ERROR",
            Self::FieldError => "FIELD_ERROR",
            Self::ConflictError => "CONFLICT_ERROR",
            Self::SchemaError => "SCHEMA_ERROR",
        }
    }

    /// Fatal classes stop all further processing of a file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IoError | Self::TranscodeError)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A non-fatal finding attached to a processed entity
///
/// The record is still emitted; schema derivation is withheld while any exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Stable error class
    pub class: ErrorClass,

    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::StructuralError, message)
    }

    pub fn field(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::FieldError, message)
    }

    /// Entity key collision, attached to the later claimant only
    pub fn conflict(key: impl std::fmt::Display, existing_path: &str) -> Self {
        Self::new(
            ErrorClass::ConflictError,
            format!(
                "entity key conflict: '{}' already defined in '{}'",
                key, existing_path
            ),
        )
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::SchemaError, message)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Fatal per-file error: no structural tree, no schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("read: {0}")]
    Io(String),

    #[error("YAML→JSON: {0}")]
    Transcode(String),

    #[error("root is not an object")]
    NotAnObject,
}

impl FatalError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Io(_) => ErrorClass::IoError,
            Self::Transcode(_) | Self::NotAnObject => ErrorClass::TranscodeError,
        }
    }
}

/// A fatal error surfaced in the run-level list, keyed by path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {error}")]
pub struct FileFailure {
    /// Path of the file that failed
    pub path: String,

    /// What went wrong
    pub error: FatalError,
}

impl FileFailure {
    pub fn new(path: impl Into<String>, error: FatalError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}
