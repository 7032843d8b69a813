//! Entiform Core
//!
//! Core domain model with stable, versioned types.
//! Never rename error class codes - they are part of the persisted output.

pub mod diagnostic;
pub mod entity;
pub mod report;
pub mod config;

pub use diagnostic::{ErrorClass, ValidationError, FatalError, FileFailure};
pub use entity::{EntityFile, ContentFingerprint, FieldType, Field, EntityKey, ProcessedEntity, REQUIRED_ENTITY_KEYS};
pub use report::{ProcessStats, EntityOutput, EntityMetadata, ValidationResult, OutputError};
pub use config::{Config, ConfigError, JSON_SCHEMA_DIALECT};
