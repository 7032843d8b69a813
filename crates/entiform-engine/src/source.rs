//! Byte sources for entity documents

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Reads the raw bytes of an entity document
///
/// Shared by every worker, so implementations must be thread-safe.
pub trait SourceReader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory documents keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    documents: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.documents.insert(path.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.documents.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such document: {}", path.display()),
            )
        })
    }
}
