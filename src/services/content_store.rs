//! In-memory content store.
//!
//! Maps a File (namespace + name) to the bytes last uploaded for it and the
//! status of that upload. Nothing is persisted; content lives for the
//! lifetime of the process.
//!
//! # Concurrency
//!
//! One `RwLock` guards the whole map. Entries are `Arc<ContentEntry>` with an
//! immutable `Bytes` payload, so the write lock is held only for the map
//! insert and readers only for an `Arc` clone. A reader therefore sees either
//! the previous entry or the new one in full.

use crate::models::status::Status;
use bytes::Bytes;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Identifies content by the File it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub namespace: String,
    pub name: String,
}

impl ContentKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Payload and outcome of the most recent successful upload.
#[derive(Debug)]
pub struct ContentEntry {
    pub data: Bytes,
    pub status: Status,
}

#[derive(Debug, Default)]
pub struct ContentStore {
    entries: RwLock<HashMap<ContentKey, Arc<ContentEntry>>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key`. Last write wins.
    pub fn put(&self, key: ContentKey, data: Bytes, status: Status) {
        let entry = Arc::new(ContentEntry { data, status });
        self.entries.write().insert(key, entry);
    }

    pub fn get(&self, key: &ContentKey) -> Option<Arc<ContentEntry>> {
        self.entries.read().get(key).cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &ContentKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Drop the entry for `key`, returning it if present.
    pub fn remove(&self, key: &ContentKey) -> Option<Arc<ContentEntry>> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
