//! In-memory implementation of [`LogStore`].
//!
//! Stores the journal in a BTreeMap so prefix listings come back in key
//! order. Useful for tests and for embedding the runtime without an
//! external database (`memory:` store URLs).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;

use super::{LogStore, WriteOutcome};

/// In-memory store backed by a `BTreeMap`.
///
/// Cloning is cheap; clones share the same underlying journal, which is
/// how tests simulate two runtime processes racing over one store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.read().expect("journal lock poisoned").len()
    }

    /// True if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<WriteOutcome, StoreError> {
        let mut entries = self.entries.write().expect("journal lock poisoned");
        match entries.get(key) {
            Some(existing) => Ok(WriteOutcome::Conflict(existing.clone())),
            None => {
                entries.insert(key.to_string(), value.to_vec());
                Ok(WriteOutcome::Written)
            }
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("journal lock poisoned");
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.read().expect("journal lock poisoned");
        Ok(entries.get(key).cloned())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let entries = self.entries.read().expect("journal lock poisoned");
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_if_absent_then_conflict() {
        let store = MemoryStore::new();

        let outcome = store.put_if_absent("k", b"first").await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        // Second writer loses and sees the first value.
        let outcome = store.put_if_absent("k", b"second").await.unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict(b"first".to_vec()));

        assert_eq!(store.read("k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let store = MemoryStore::new();
        store.write("k", b"v1").await.unwrap();
        store.write("k", b"v2").await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_read_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.read("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_prefix_ordering_and_boundary() {
        let store = MemoryStore::new();
        store.write("step/a/00000002", b"2").await.unwrap();
        store.write("step/a/00000001", b"1").await.unwrap();
        store.write("step/ab/00000001", b"x").await.unwrap();
        store.write("instance/a", b"i").await.unwrap();

        let listed = store.list_prefix("step/a/").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|(k, _)| k.as_str()).collect();

        // Ascending order, and "step/ab/..." must not leak into "step/a/".
        assert_eq!(keys, vec!["step/a/00000001", "step/a/00000002"]);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.write("k", b"v").await.unwrap();
        assert_eq!(other.read("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(other.len(), 1);
    }
}
