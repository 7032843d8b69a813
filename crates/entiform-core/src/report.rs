//! Run summaries and the persisted entity output (stable v1)
//!
//! The output schema is STABLE. Breaking changes require a new version.

use crate::diagnostic::FileFailure;
use crate::entity::{string_field, ProcessedEntity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Summary counts over the processed collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Number of processed records
    pub total: usize,

    /// Records without a fatal error
    pub success: usize,

    /// Records with a fatal error
    pub failed: usize,

    /// Records carrying at least one non-fatal error
    pub with_errors: usize,

    /// Sum of non-fatal errors across records
    pub total_errors: usize,
}

impl ProcessStats {
    pub fn from_processed(processed: &[ProcessedEntity]) -> Self {
        let mut stats = Self {
            total: processed.len(),
            ..Self::default()
        };

        for entity in processed {
            if entity.fatal.is_some() {
                stats.failed += 1;
            } else {
                stats.success += 1;
            }
            if !entity.errors.is_empty() {
                stats.with_errors += 1;
                stats.total_errors += entity.errors.len();
            }
        }

        stats
    }
}

/// Any processed record carries a non-fatal error
pub fn has_validation_errors(processed: &[ProcessedEntity]) -> bool {
    processed.iter().any(|p| !p.errors.is_empty())
}

/// Path -> error messages, for records with findings
pub fn collect_validation_errors(processed: &[ProcessedEntity]) -> BTreeMap<String, Vec<String>> {
    processed
        .iter()
        .filter(|p| !p.errors.is_empty())
        .map(|p| (p.file.display_path(), p.error_messages()))
        .collect()
}

/// Whether a run should be reported as failing
///
/// Fatal and non-fatal errors each fail the run on their own.
pub fn is_failing(processed: &[ProcessedEntity], fatal_errors: &[FileFailure]) -> bool {
    !fatal_errors.is_empty() || has_validation_errors(processed)
}

/// Identity and provenance of one persisted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub module: String,
    pub object: String,
    pub property: String,
    pub code: String,
    pub name: String,
    pub source_file: String,
    pub file_size: u64,
    pub mod_time: DateTime<Utc>,

    /// Hex content fingerprint
    pub content_hash: String,

    pub processed_at: DateTime<Utc>,
}

/// Validation block of one persisted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub has_fatal: bool,
    pub error_count: usize,
    pub errors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

/// One element of the persisted output sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOutput {
    pub metadata: EntityMetadata,

    pub parsed_data: Option<Value>,

    /// Pretty-printed transcoded document
    pub json_data: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    pub validation: ValidationResult,
}

impl EntityOutput {
    pub fn from_processed(entity: &ProcessedEntity, processed_at: DateTime<Utc>) -> Self {
        let field = |key: &str| {
            entity
                .root()
                .map(|root| string_field(root, key).to_string())
                .unwrap_or_default()
        };

        let metadata = EntityMetadata {
            module: field("module"),
            object: field("object"),
            property: field("property"),
            code: field("code"),
            name: field("name"),
            source_file: entity.file.display_path(),
            file_size: entity.file.size,
            mod_time: entity.file.modified,
            content_hash: entity.fingerprint.to_hex(),
            processed_at,
        };

        let json_data = entity
            .tree
            .as_ref()
            .and_then(|tree| serde_json::to_string_pretty(tree).ok())
            .unwrap_or_default();

        let validation = ValidationResult {
            is_valid: entity.is_valid(),
            has_fatal: entity.fatal.is_some(),
            error_count: entity.errors.len(),
            errors: entity.error_messages(),
            fatal_error: entity.fatal.as_ref().map(ToString::to_string),
        };

        Self {
            metadata,
            parsed_data: entity.tree.clone(),
            json_data,
            schema: entity.schema.clone(),
            validation,
        }
    }
}

/// Output persistence errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("create directory {0}: {1}")]
    CreateDir(String, String),

    #[error("write {0}: {1}")]
    Write(String, String),

    #[error("encode JSON: {0}")]
    Encode(String),
}

/// Write processed entities as a pretty JSON array, creating parent directories
///
/// Returns the number of entities written.
pub fn save_entities_to_json(processed: &[ProcessedEntity], path: &Path) -> Result<usize, OutputError> {
    let processed_at = Utc::now();
    let output: Vec<EntityOutput> = processed
        .iter()
        .map(|entity| EntityOutput::from_processed(entity, processed_at))
        .collect();

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| OutputError::CreateDir(dir.display().to_string(), e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| OutputError::Encode(e.to_string()))?;

    std::fs::write(path, json)
        .map_err(|e| OutputError::Write(path.display().to_string(), e.to_string()))?;

    Ok(output.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{FatalError, ValidationError};
    use crate::entity::{ContentFingerprint, EntityFile};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entity(path: &str, errors: &[&str]) -> ProcessedEntity {
        let bytes = path.as_bytes();
        let mut entity = ProcessedEntity::new(
            EntityFile::new(path, bytes.len() as u64, Utc::now()),
            ContentFingerprint::of(bytes),
        );
        entity.tree = Some(json!({
            "module": "crm",
            "object": "contact",
            "property": "email",
            "code": "primary",
            "name": "Primary email",
            "fields": [],
        }));
        for message in errors {
            entity.push_error(ValidationError::field(*message));
        }
        entity
    }

    #[test]
    fn stats_over_processed() {
        let mut fatal = entity("c.yml", &[]);
        fatal.fatal = Some(FatalError::NotAnObject);

        let processed = vec![
            entity("a.yml", &[]),
            entity("b.yml", &["one", "two"]),
            fatal,
        ];

        let stats = ProcessStats::from_processed(&processed);
        assert_eq!(
            stats,
            ProcessStats {
                total: 3,
                success: 2,
                failed: 1,
                with_errors: 1,
                total_errors: 2,
            }
        );
    }

    #[test]
    fn failing_run_detection() {
        let clean = vec![entity("a.yml", &[])];
        assert!(!is_failing(&clean, &[]));

        let dirty = vec![entity("a.yml", &["bad"])];
        assert!(is_failing(&dirty, &[]));

        let fatal = vec![FileFailure::new("x.yml", FatalError::Io("gone".into()))];
        assert!(is_failing(&clean, &fatal));
    }

    #[test]
    fn validation_errors_keyed_by_path() {
        let processed = vec![entity("b.yml", &["bad"]), entity("a.yml", &[])];
        let errors = collect_validation_errors(&processed);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors["b.yml"], vec!["bad".to_string()]);
    }

    #[test]
    fn entity_output_shape() {
        let mut clean = entity("a.yml", &[]);
        clean.schema = Some(json!({ "type": "object" }));

        let output = EntityOutput::from_processed(&clean, Utc::now());
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["metadata"]["module"], "crm");
        assert_eq!(value["metadata"]["name"], "Primary email");
        assert_eq!(value["metadata"]["content_hash"], clean.fingerprint.to_hex());
        assert_eq!(value["validation"]["is_valid"], true);
        assert!(value["validation"].get("fatal_error").is_none());
        assert_eq!(value["schema"]["type"], "object");
        assert!(output.json_data.contains("\"module\": \"crm\""));

        let dirty = EntityOutput::from_processed(&entity("b.yml", &["bad"]), Utc::now());
        let value = serde_json::to_value(&dirty).unwrap();
        assert!(value.get("schema").is_none());
        assert_eq!(value["validation"]["error_count"], 1);
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/entities.json");

        let written = save_entities_to_json(&[entity("a.yml", &[])], &path).unwrap();
        assert_eq!(written, 1);

        let saved: Vec<EntityOutput> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved[0].metadata.source_file, "a.yml");
    }
}
