//! Entity package loading
//!
//! This crate handles:
//! - Parsing package.yml (name, version, region, dependencies)
//! - Discovering entity documents under `entities/`
//! - Package-level size and structure hash

pub mod manifest;
pub mod scanner;

pub use manifest::{PackageManifest, PackageError, MANIFEST_FILE_NAME};
pub use scanner::{scan_entities, structure_hash, is_entity_document};

use entiform_core::EntityFile;
use std::path::{Path, PathBuf};

/// Directory holding entity documents inside a package
pub const ENTITIES_DIR: &str = "entities";

/// A loaded package: manifest plus the entity files it ships
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Package directory
    pub root: PathBuf,

    pub manifest: PackageManifest,

    /// Entity documents, sorted by path
    pub files: Vec<EntityFile>,

    /// Sum of entity file sizes in bytes
    pub total_size: u64,

    /// Layout hash over names, sizes and modification times
    pub structure_hash: u64,
}

impl Package {
    /// Load package.yml and scan the entities directory
    pub fn load(dir: &Path) -> Result<Self, PackageError> {
        let manifest = PackageManifest::from_file(&dir.join(MANIFEST_FILE_NAME))?;

        let entities_dir = dir.join(ENTITIES_DIR);
        if !entities_dir.is_dir() {
            return Err(PackageError::MissingEntities);
        }

        let files = scan_entities(&entities_dir)?;
        let total_size = files.iter().map(|f| f.size).sum();
        let structure_hash = structure_hash(&files);

        tracing::info!(
            package = %manifest.name,
            version = %manifest.version,
            files = files.len(),
            "loaded package"
        );

        Ok(Self {
            root: dir.to_path_buf(),
            manifest,
            files,
            total_size,
            structure_hash,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.files.len()
    }

    /// Structure hash as 16 hex digits
    pub fn structure_hash_hex(&self) -> String {
        format!("{:016x}", self.structure_hash)
    }
}
