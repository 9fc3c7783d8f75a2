use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// A bounded LRU cache behind a short mutex, shared by concurrent readers.
///
/// The lock is held only for the map operation itself, never across a trie
/// or graph traversal, so contention stays negligible next to the lookup
/// work the cache saves. Values are cloned out; both caches of the engine
/// store [Copy]-like payloads (a section offset, a split position), so the
/// clone is a register move.
///
/// The cache is an invisible optimisation: hits and misses produce byte-for-
/// byte the same results as running the underlying traversal again.
pub(crate) struct LookupCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> LookupCache<K, V> {
    pub fn new(capacity: usize) -> LookupCache<K, V> {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        LookupCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }
}
