//! Typed memo tables.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Cached results of one query kind.
pub struct QueryTable<K, V> {
    entries: RwLock<FxHashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> QueryTable<K, V> {
    pub fn new() -> Self {
        QueryTable {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for QueryTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
