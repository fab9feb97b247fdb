//! Keyed store with deterministic (sorted key) iteration order.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use vigilant_core::ObjectKey;

struct Inner<V> {
    items: FxHashMap<ObjectKey, V>,
    /// Always exactly the key set of `items`, ascending, no duplicates.
    order: Vec<ObjectKey>,
}

/// Map plus sorted key list, guarded together by one lock so readers never
/// observe the two out of step.
pub struct OrderedCollection<V> {
    inner: RwLock<Inner<V>>,
}

impl<V> Default for OrderedCollection<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> OrderedCollection<V> {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { items: FxHashMap::default(), order: Vec::new() }) }
    }

    // Writers never leave the pair half-updated, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner<V>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite. Only a first insertion touches the key order.
    pub fn set(&self, key: ObjectKey, value: V) {
        let mut g = self.write();
        if let Err(pos) = g.order.binary_search(&key) {
            g.order.insert(pos, key.clone());
        }
        g.items.insert(key, value);
    }

    /// Remove a key. No-op when absent.
    pub fn delete(&self, key: &ObjectKey) {
        let mut g = self.write();
        if g.items.remove(key).is_some() {
            if let Ok(pos) = g.order.binary_search(key) {
                g.order.remove(pos);
            }
        }
    }

    pub fn clear(&self) {
        let mut g = self.write();
        g.items.clear();
        g.order.clear();
    }

    /// Replace the whole content in one critical section.
    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (ObjectKey, V)>,
    {
        let mut items = FxHashMap::default();
        for (k, v) in entries {
            items.insert(k, v);
        }
        let mut order: Vec<ObjectKey> = items.keys().cloned().collect();
        order.sort_unstable();
        let mut g = self.write();
        g.items = items;
        g.order = order;
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.read().items.contains_key(key)
    }

    /// Sorted snapshot of the keys.
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.read().order.clone()
    }
}

impl<V: Clone> OrderedCollection<V> {
    pub fn get(&self, key: &ObjectKey) -> Option<V> {
        self.read().items.get(key).cloned()
    }

    /// Snapshot of the values in ascending key order. The returned vector is
    /// owned by the caller; later mutation of the collection never touches it.
    pub fn values(&self) -> Vec<V> {
        let g = self.read();
        g.order.iter().filter_map(|k| g.items.get(k).cloned()).collect()
    }
}
