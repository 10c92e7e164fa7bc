//! Bounded LRU Cache
//!
//! A fixed-capacity, thread-safe store keyed by 64-bit chunk keys (usually a
//! chunk's base address). Scan workers use it to remember what a chunk held
//! on the previous pass.
//!
//! The value map and the recency list live behind a single mutex and every
//! operation holds it for its whole duration, so the two can never be
//! observed out of sync and operations on one cache are linearizable.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Capacity used by [`LruCache::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Counters describing cache traffic since construction.
///
/// `flush` drops entries but keeps the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// A bounded least-recently-used cache.
///
/// Values are handed out as clones. Store `Arc<..>` payloads to share large
/// buffers without copying them.
pub struct LruCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

struct Node<V> {
    key: u64,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Nodes form a doubly linked list threaded through a dense vector.
/// `head` is the least recently used entry, `tail` the most recent.
struct Inner<V> {
    index: HashMap<u64, usize>,
    nodes: Vec<Node<V>>,
    head: Option<usize>,
    tail: Option<usize>,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn with_capacity(capacity: usize) -> Self {
        Inner {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            stats: CacheStats::default(),
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_back(&mut self, idx: usize) {
        self.nodes[idx].prev = self.tail;
        self.nodes[idx].next = None;

        match self.tail {
            Some(t) => self.nodes[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.tail != Some(idx) {
            self.unlink(idx);
            self.push_back(idx);
        }
    }

    /// Remove the node at `idx` from the list, the index and the vector.
    fn remove_at(&mut self, idx: usize) -> Node<V> {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);
        self.index.remove(&node.key);

        // The former last node now lives at idx; repoint its neighbours.
        if idx < self.nodes.len() {
            let (key, prev, next) = {
                let moved = &self.nodes[idx];
                (moved.key, moved.prev, moved.next)
            };
            self.index.insert(key, idx);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
        }

        node
    }

    fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from least to most recently used.
    fn recency(&self) -> Vec<u64> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].key);
            cursor = self.nodes[idx].next;
        }
        keys
    }
}

impl<V> LruCache<V> {
    /// Create a cache holding at most `capacity` entries. A capacity of zero
    /// is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LruCache {
            capacity,
            inner: Mutex::new(Inner::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check for a key without counting as an access.
    pub fn contains(&self, key: u64) -> bool {
        self.inner.lock().index.contains_key(&key)
    }

    /// Remove a key. Absent keys are a no-op.
    pub fn delete(&self, key: u64) -> Option<V> {
        let mut inner = self.inner.lock();
        let idx = inner.index.get(&key).copied()?;
        Some(inner.remove_at(idx).value)
    }

    /// Drop every entry and the recency order.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.nodes.len();
        inner.clear();
        tracing::debug!(dropped, "flushed cache");
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<u64> {
        self.inner.lock().recency()
    }
}

impl<V: Clone> LruCache<V> {
    /// Replace the value of an existing key without changing its recency.
    ///
    /// Returns false, and stores nothing, if the key is absent.
    pub fn try_update(&self, key: u64, value: V) -> bool {
        let mut inner = self.inner.lock();
        match inner.index.get(&key).copied() {
            Some(idx) => {
                inner.nodes[idx].value = value;
                true
            }
            None => false,
        }
    }

    /// Insert or overwrite `key` and mark it most recently used.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry. Returns the stored value.
    pub fn add(&self, key: u64, value: V) -> V {
        let mut inner = self.inner.lock();

        if let Some(idx) = inner.index.get(&key).copied() {
            inner.nodes[idx].value = value.clone();
            inner.touch(idx);
            return value;
        }

        if inner.nodes.len() >= self.capacity {
            if let Some(lru) = inner.head {
                let evicted = inner.remove_at(lru);
                inner.stats.evictions += 1;
                tracing::trace!(key = evicted.key, "evicted least recently used entry");
            }
        }

        let idx = inner.nodes.len();
        inner.nodes.push(Node {
            key,
            value: value.clone(),
            prev: None,
            next: None,
        });
        inner.index.insert(key, idx);
        inner.push_back(idx);

        value
    }

    /// Look up a key and mark it most recently used.
    pub fn get(&self, key: u64) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.index.get(&key).copied() {
            Some(idx) => {
                inner.touch(idx);
                inner.stats.hits += 1;
                Some(inner.nodes[idx].value.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// [`LruCache::get`] with a default value standing in for a miss.
    ///
    /// A stored default and a missing key look the same through this method.
    pub fn get_or_default(&self, key: u64) -> V
    where
        V: Default,
    {
        self.get(key).unwrap_or_default()
    }
}

impl<V> Default for LruCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &inner.nodes.len())
            .field("stats", &inner.stats)
            .finish()
    }
}
