//! Keyed in-memory store shared by the in-process adapters
//!
//! `DashMap` shards give concurrent readers without a global lock; the `Arc`
//! lets one store back several adapters.

use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};

/// Thread-safe keyed store
#[derive(Debug)]
pub struct InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    data: Arc<DashMap<K, V>>,
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Create empty store
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Number of keys
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Clone of the value under `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Read the value under `key` without cloning it
    pub fn with<T>(&self, key: &K, f: impl FnOnce(&V) -> T) -> Option<T> {
        self.data.get(key).map(|entry| f(entry.value()))
    }

    /// Insert or replace
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.insert(key, value)
    }

    /// Mutate the value under `key`, creating it with `init` first if absent
    pub fn update(&self, key: K, init: impl FnOnce() -> V, f: impl FnOnce(&mut V)) {
        let mut entry = self.data.entry(key).or_insert_with(init);
        f(entry.value_mut());
    }

    /// Remove and return the value under `key`
    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, value)| value)
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Default for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}
