//! package.yml parsing
//!
//! Parses the package manifest that sits next to the `entities/` directory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Manifest file name inside a package directory
pub const MANIFEST_FILE_NAME: &str = "package.yml";

/// package.yml structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Semantic version (X.Y.Z)
    #[serde(default)]
    pub version: String,

    /// Package name (4-32 characters)
    #[serde(default)]
    pub name: String,

    /// Optional region code (2-3 characters)
    #[serde(default)]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Dependency name -> version
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Load and validate a manifest from file
    pub fn from_file(path: &Path) -> Result<Self, PackageError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PackageError::IoError(format!("cannot read {}", MANIFEST_FILE_NAME), e.to_string())
        })?;

        Self::from_yaml(&contents)
    }

    /// Parse and validate a manifest from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self, PackageError> {
        let manifest: PackageManifest = serde_yaml::from_str(yaml)
            .map_err(|e| PackageError::ParseError(e.to_string()))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Check name, version and region constraints
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.name.is_empty() {
            return Err(PackageError::InvalidManifest("'name' is required".to_string()));
        }

        let name_len = self.name.chars().count();
        if !(4..=32).contains(&name_len) {
            return Err(PackageError::InvalidManifest(format!(
                "'name' must be 4-32 characters, got {} ({})",
                name_len, self.name
            )));
        }

        if self.version.is_empty() {
            return Err(PackageError::InvalidManifest("'version' is required".to_string()));
        }

        let version_pattern = Regex::new(r"^\d+\.\d+\.\d+$")
            .map_err(|e| PackageError::ParseError(e.to_string()))?;
        if !version_pattern.is_match(&self.version) {
            return Err(PackageError::InvalidManifest(format!(
                "'version' must be X.Y.Z format (e.g. 0.0.1), got {}",
                self.version
            )));
        }

        if !self.region.is_empty() {
            let region_len = self.region.chars().count();
            if !(2..=3).contains(&region_len) {
                return Err(PackageError::InvalidManifest(format!(
                    "'region' must be 2-3 characters (e.g. 'ru'), got {}",
                    self.region
                )));
            }
        }

        Ok(())
    }
}

/// Package loading errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("{0}: {1}")]
    IoError(String, String),

    #[error("invalid YAML in package.yml: {0}")]
    ParseError(String),

    #[error("error validating package.yml: {0}")]
    InvalidManifest(String),

    #[error("package does not have entities in the /entities directory")]
    MissingEntities,

    #[error("entities scan failed: {0}")]
    ScanError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_full_manifest() {
        let manifest = PackageManifest::from_yaml(
            r#"
name: crm-base
version: 1.2.3
region: ru
description: Base CRM entities
tags: [crm, base]
dependencies:
  core-types: 0.1.0
"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "crm-base");
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.region, "ru");
        assert_eq!(manifest.tags, vec!["crm", "base"]);
        assert_eq!(manifest.dependencies["core-types"], "0.1.0");
    }

    #[test]
    fn name_constraints() {
        let err = PackageManifest::from_yaml("version: 1.0.0").unwrap_err();
        assert_eq!(err.to_string(), "error validating package.yml: 'name' is required");

        let err = PackageManifest::from_yaml("name: abc\nversion: 1.0.0").unwrap_err();
        assert!(err.to_string().contains("'name' must be 4-32 characters, got 3 (abc)"));

        // Counted in characters, not bytes
        assert!(PackageManifest::from_yaml("name: пакет\nversion: 1.0.0").is_ok());
    }

    #[test]
    fn version_constraints() {
        let err = PackageManifest::from_yaml("name: crm-base").unwrap_err();
        assert!(err.to_string().contains("'version' is required"));

        let err = PackageManifest::from_yaml("name: crm-base\nversion: '1.0'").unwrap_err();
        assert!(err.to_string().contains("must be X.Y.Z format"));
    }

    #[test]
    fn region_constraints() {
        assert!(PackageManifest::from_yaml("name: crm-base\nversion: 1.0.0\nregion: ''").is_ok());

        let err = PackageManifest::from_yaml("name: crm-base\nversion: 1.0.0\nregion: russia").unwrap_err();
        assert!(err.to_string().contains("'region' must be 2-3 characters"));
    }

    #[test]
    fn invalid_yaml() {
        let err = PackageManifest::from_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, PackageError::ParseError(_)));
    }
}
