//! Bounded recency cache used to deduplicate the advertisement stream.
//!
//! This is an LRU *membership* cache, not a value cache: it answers "have I
//! already processed this device address during the current scan session".
//! Advertisement volume can be orders of magnitude higher than the unique
//! device count, so the scanner consults this cache before doing any plugin
//! matching.

use std::collections::HashMap;
use std::hash::Hash;

/// Default number of distinct addresses remembered per scan session.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

const NIL: usize = usize::MAX;

struct Node<K> {
    key: K,
    prev: usize,
    next: usize,
}

/// Fixed-capacity set with least-recently-seen eviction.
///
/// All operations are O(1) amortized: recency order lives in an index-linked
/// node list and a `HashMap` maps each key to its slot. Capacity is fixed at
/// construction and never grows; entries only leave through LRU eviction or
/// `clear` (there is no TTL).
pub struct RecencyCache<K> {
    capacity: usize,
    nodes: Vec<Node<K>>,
    index: HashMap<K, usize>,
    head: usize,
    tail: usize,
}

impl<K: Eq + Hash + Clone> RecencyCache<K> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            capacity,
            nodes: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` and refreshes recency when `key` is already present.
    ///
    /// Otherwise inserts `key` as most-recently-seen and returns `false`,
    /// evicting the least-recently-seen entry first when at capacity.
    pub fn check_and_update(&mut self, key: &K) -> bool {
        if let Some(&slot) = self.index.get(key) {
            self.detach(slot);
            self.attach_front(slot);
            return true;
        }

        let slot = if self.nodes.len() < self.capacity {
            self.nodes.push(Node {
                key: key.clone(),
                prev: NIL,
                next: NIL,
            });
            self.nodes.len() - 1
        } else {
            // Cache is full: reuse the least-recently-seen slot.
            let slot = self.tail;
            self.detach(slot);
            self.index.remove(&self.nodes[slot].key);
            self.nodes[slot].key = key.clone();
            slot
        };

        self.attach_front(slot);
        self.index.insert(key.clone(), slot);
        false
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else if self.head == slot {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else if self.tail == slot {
            self.tail = prev;
        }
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }

    fn attach_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }
}
