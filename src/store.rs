//! The replace-with-store seam.
//!
//! Process-local maps only, each behind a `Put/Get/Delete/List` interface so
//! a persistent backend can be swapped in without touching callers.
//! A single generic `Store<K, V>` trait abstracts over storage with one
//! in-memory implementation shipping by default.

use dashmap::DashMap;
use std::hash::Hash;

/// `Put/Get/Delete/List(filter)` semantics.
pub trait Store<K, V>: Send + Sync {
    fn put(&self, key: K, value: V);
    fn get(&self, key: &K) -> Option<V>;
    fn delete(&self, key: &K) -> Option<V>;
    fn list(&self, filter: impl Fn(&V) -> bool) -> Vec<V>;
}

/// `DashMap`-backed in-memory implementation; the default (and, for this
/// crate, only) backend.
pub struct InMemoryStore<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> Default for InMemoryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Store<K, V> for InMemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn put(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn delete(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn list(&self, filter: impl Fn(&V) -> bool) -> Vec<V> {
        self.entries
            .iter()
            .map(|e| e.value().clone())
            .filter(|v| filter(v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let store: InMemoryStore<String, u32> = InMemoryStore::new();
        store.put("a".to_string(), 1);
        assert_eq!(store.get(&"a".to_string()), Some(1));
        assert_eq!(store.delete(&"a".to_string()), Some(1));
        assert_eq!(store.get(&"a".to_string()), None);
    }

    #[test]
    fn list_applies_filter() {
        let store: InMemoryStore<u32, u32> = InMemoryStore::new();
        store.put(1, 10);
        store.put(2, 20);
        store.put(3, 30);
        let evens = store.list(|v| v % 20 == 0);
        assert_eq!(evens.len(), 1);
        assert_eq!(evens[0], 20);
    }
}
