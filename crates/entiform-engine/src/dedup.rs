//! Content deduplication across workers

use entiform_core::ContentFingerprint;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Set of fingerprints already claimed during a run
///
/// Check and insert happen under one lock, so exactly one caller wins
/// each fingerprint.
#[derive(Debug, Default)]
pub struct ContentDeduplicator {
    seen: Mutex<HashSet<ContentFingerprint>>,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a fingerprint; false when another file already holds it
    pub fn try_claim(&self, fingerprint: ContentFingerprint) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
