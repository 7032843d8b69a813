//! Per-file processing: fingerprint, transcode, validate, derive
//!
//! Processing one file never depends on any other file. Cross-file concerns
//! (duplicate content, identity conflicts) belong to the pipeline.

use crate::schema_gen::derive_schema;
use crate::source::SourceReader;
use crate::validation::{validate_fields, validate_structure};
use entiform_core::{ContentFingerprint, EntityFile, FatalError, ProcessedEntity, ValidationError};
use serde_json::Value;

/// Stateless processor for a single entity document
pub struct EntityProcessor;

impl EntityProcessor {
    /// Read through `reader`, then process
    pub fn process_file<R: SourceReader + ?Sized>(file: EntityFile, reader: &R) -> ProcessedEntity {
        match reader.read(&file.path) {
            Ok(content) => Self::process(file, &content),
            Err(e) => {
                let mut entity = ProcessedEntity::new(file, ContentFingerprint::of(&[]));
                entity.fatal = Some(FatalError::Io(e.to_string()));
                entity
            }
        }
    }

    pub fn process(file: EntityFile, content: &[u8]) -> ProcessedEntity {
        let fingerprint = ContentFingerprint::of(content);
        Self::process_with_fingerprint(file, content, fingerprint)
    }

    /// Process bytes whose fingerprint is already known
    pub fn process_with_fingerprint(
        file: EntityFile,
        content: &[u8],
        fingerprint: ContentFingerprint,
    ) -> ProcessedEntity {
        let mut entity = ProcessedEntity::new(file, fingerprint);

        let tree = match transcode(content) {
            Ok(tree) => tree,
            Err(e) => {
                entity.fatal = Some(e);
                return entity;
            }
        };

        let Some(root) = tree.as_object() else {
            entity.fatal = Some(FatalError::NotAnObject);
            return entity;
        };

        let mut errors = validate_structure(root);
        errors.extend(validate_fields(root));

        if errors.is_empty() {
            match derive_schema(root) {
                Ok(schema) => entity.schema = Some(schema),
                Err(e) => errors.push(ValidationError::schema(format!(
                    "JSON Schema generation failed: {}",
                    e
                ))),
            }
        }

        entity.errors = errors;
        entity.tree = Some(tree);
        entity
    }
}

/// Decode YAML bytes straight into the JSON data model
///
/// Mapping keys must be strings; anything else fails the transcode.
pub fn transcode(content: &[u8]) -> Result<Value, FatalError> {
    serde_yaml::from_slice::<Value>(content).map_err(|e| FatalError::Transcode(e.to_string()))
}
