//! Entity file discovery

use crate::manifest::PackageError;
use chrono::{DateTime, Utc};
use entiform_core::EntityFile;
use std::path::Path;
use walkdir::WalkDir;
use xxhash_rust::xxh64::Xxh64;

/// Whether a file name looks like an entity document (.yml / .yaml)
pub fn is_entity_document(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".yml") || lower.ends_with(".yaml")
}

/// Recursively collect entity documents under `dir`, sorted by path
pub fn scan_entities(dir: &Path) -> Result<Vec<EntityFile>, PackageError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::ScanError(e.to_string()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_entity_document(name) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| PackageError::ScanError(e.to_string()))?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        files.push(EntityFile::new(entry.path(), metadata.len(), modified));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(dir = %dir.display(), count = files.len(), "scanned entity files");

    Ok(files)
}

/// Hash of the package layout: each file's name, size and modification time
///
/// Changes whenever a file is added, removed, renamed, resized or touched.
pub fn structure_hash(files: &[EntityFile]) -> u64 {
    let mut hasher = Xxh64::new(0);
    for file in files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update(&file.size.to_le_bytes());
        hasher.update(&file.modified.timestamp().to_le_bytes());
    }
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn entity_document_names() {
        assert!(is_entity_document("contact.yml"));
        assert!(is_entity_document("CONTACT.YAML"));
        assert!(!is_entity_document("contact.json"));
        assert!(!is_entity_document("yml"));
    }

    #[test]
    fn scan_finds_nested_yaml_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("crm/contact")).unwrap();
        fs::write(dir.path().join("crm/contact/email.yml"), "code: email\n").unwrap();
        fs::write(dir.path().join("crm/phone.YAML"), "code: phone\n").unwrap();
        fs::write(dir.path().join("README.md"), "# notes\n").unwrap();

        let files = scan_entities(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("crm/contact/email.yml"));
        assert!(files[1].path.ends_with("crm/phone.YAML"));
        assert_eq!(files[0].size, "code: email\n".len() as u64);
    }

    #[test]
    fn structure_hash_tracks_layout() {
        let modified = Utc::now();
        let a = EntityFile::new("entities/a.yml", 10, modified);
        let b = EntityFile::new("entities/b.yml", 20, modified);

        let base = structure_hash(&[a.clone(), b.clone()]);
        assert_eq!(base, structure_hash(&[a.clone(), b.clone()]));

        let resized = EntityFile::new("entities/b.yml", 21, modified);
        assert_ne!(base, structure_hash(&[a.clone(), resized]));
        assert_ne!(base, structure_hash(&[a]));
    }
}
