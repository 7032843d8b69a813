//! Identity registry: which file holds each entity key

use entiform_core::EntityKey;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Maps entity keys to the path of the first file that registered them
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    holders: Mutex<HashMap<EntityKey, String>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` for `path`
    ///
    /// Returns `None` when the key was free and is now held by `path`, or
    /// the current holder's path when the key was already taken. The
    /// holder never changes once set.
    pub fn register(&self, key: EntityKey, path: impl Into<String>) -> Option<String> {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);

        match holders.entry(key) {
            Entry::Occupied(holder) => Some(holder.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(path.into());
                None
            }
        }
    }

    pub fn holder(&self, key: &EntityKey) -> Option<String> {
        self.holders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
