//! In-memory store adapter
//!
//! Implements both store ports on top of DashMap. Used by tests and by the
//! CLI when no Redis URL is configured.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::ports::{CacheStore, ValueStore};
use crate::error::{Error, Result};

/// In-memory store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryStoreStats {
    /// Number of sets
    pub set_count: u64,
    /// Members across all sets
    pub member_count: u64,
    /// Number of plain values
    pub value_count: u64,
    /// Bytes held by set members and plain values
    pub total_bytes: u64,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
}

/// In-memory key-value store with set and plain-value operations
pub struct InMemoryCacheStore {
    /// Sets (key -> members), deduplicated by raw bytes
    sets: DashMap<String, HashSet<Bytes>>,
    /// Plain values
    values: DashMap<String, Bytes>,
    /// When false every call fails with `StoreUnavailable`
    available: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self {
            sets: DashMap::new(),
            values: DashMap::new(),
            available: AtomicBool::new(true),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }
}

impl InMemoryCacheStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Keys of all sets, sorted
    pub fn set_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sets.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Get storage statistics
    pub fn stats(&self) -> InMemoryStoreStats {
        let mut stats = InMemoryStoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            ..Default::default()
        };

        for set in self.sets.iter() {
            stats.set_count += 1;
            stats.member_count += set.len() as u64;
            stats.total_bytes += set.iter().map(|m| m.len() as u64).sum::<u64>();
        }
        for value in self.values.iter() {
            stats.value_count += 1;
            stats.total_bytes += value.len() as u64;
        }
        stats
    }

    fn check_available(&self, op: &str, key: &str) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "in-memory store offline during {} on '{}'",
                op, key
            )))
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn set_add(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        self.check_available("SADD", key)?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let added = self
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(Bytes::from(value));

        debug!(key, added, "SADD");
        Ok(added)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        self.check_available("SMEMBERS", key)?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let members = self
            .sets
            .get(key)
            .map(|set| set.iter().map(|m| m.to_vec()).collect())
            .unwrap_or_default();
        Ok(members)
    }

    async fn set_remove(&self, key: &str, value: &[u8]) -> Result<bool> {
        self.check_available("SREM", key)?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let removed = match self.sets.get_mut(key) {
            Some(mut set) => set.remove(value),
            None => false,
        };
        // a set left empty disappears, like in Redis
        self.sets.remove_if(key, |_, set| set.is_empty());

        Ok(removed)
    }
}

#[async_trait]
impl ValueStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available("GET", key)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.values.get(key).map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_available("SET", key)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.values.insert(key.to_string(), Bytes::from(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_set_dedup_by_bytes() {
        let store = InMemoryCacheStore::new();

        assert!(store.set_add("k", b"a".to_vec()).await.unwrap());
        assert!(!store.set_add("k", b"a".to_vec()).await.unwrap());
        assert!(store.set_add("k", b"b".to_vec()).await.unwrap());

        let mut members = store.set_members("k").await.unwrap();
        members.sort();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_missing_set_is_empty() {
        let store = InMemoryCacheStore::new();
        assert!(store.set_members("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_remove_drops_empty_set() {
        let store = InMemoryCacheStore::new();
        store.set_add("k", b"a".to_vec()).await.unwrap();

        assert!(store.set_remove("k", b"a").await.unwrap());
        assert!(!store.set_remove("k", b"a").await.unwrap());
        assert!(store.set_keys().is_empty());
    }

    #[tokio::test]
    async fn test_plain_values() {
        let store = InMemoryCacheStore::new();
        assert_eq!(ValueStore::get(&store, "normal:string").await.unwrap(), None);

        ValueStore::set(&store, "normal:string", b"[1,2]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            ValueStore::get(&store, "normal:string").await.unwrap(),
            Some(b"[1,2]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_outage() {
        let store = InMemoryCacheStore::new();
        store.set_available(false);

        assert_matches!(
            store.set_add("k", vec![1]).await,
            Err(Error::StoreUnavailable(_))
        );
        assert_matches!(store.set_members("k").await, Err(Error::StoreUnavailable(_)));

        store.set_available(true);
        assert!(store.set_add("k", vec![1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryCacheStore::new();
        store.set_add("a", vec![0; 10]).await.unwrap();
        store.set_add("a", vec![1; 5]).await.unwrap();
        store.set_add("b", vec![2; 1]).await.unwrap();
        ValueStore::set(&store, "v", vec![3; 4]).await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.set_count, 2);
        assert_eq!(stats.member_count, 3);
        assert_eq!(stats.value_count, 1);
        assert_eq!(stats.total_bytes, 20);
        assert_eq!(stats.writes, 4);
    }
}
