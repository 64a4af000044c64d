//! Uniqueness sets: ordered or hashed, unbounded or LRU-bounded
//! ("forgetful").
//!
//! The forgetful variants need O(1) eviction of the least-recently-used
//! entry plus O(1) refresh-on-reinsert. Holding a raw pointer or iterator
//! from the backing set on each LRU list node would give O(1) eviction
//! without a second lookup, but there's no way to keep such a handle live
//! across further mutation of a `Vec`/`HashMap` without unsafe code.
//! Instead the LRU list is arena-backed (nodes live in a `Vec` and refer
//! to each other by index) and each node carries its own clone of the key,
//! so eviction relocates the matching entry in the backing structure by
//! key instead of by handle. This over-copying is acceptable because it
//! only touches the bounded, small-N forgetful path, not the streaming
//! match buffer where copies matter.

use std::collections::HashMap;

use crate::numeric::Comparator;

/// One of the four uniqueness set shapes, all exposing the same
/// `insert(key) -> bool` capability: the pipeline already owns the token
/// being tested, so the set only needs to report whether it was new.
pub struct UniquenessSet {
    backing: Backing,
    lru: Option<LruList>,
    capacity: usize,
}

enum Backing {
    /// `OrderedUnique` / `ForgetfulOrdered`: a sorted vector, found by
    /// binary search under `comparator`. A balanced tree would give
    /// better insert complexity at large N; a sorted `Vec` is simpler and
    /// cache-friendlier, and stands in for one here.
    Ordered {
        comparator: Comparator,
        entries: Vec<Entry>,
    },
    /// `HashUnique` / `ForgetfulHash`: a bucket map keyed by
    /// `comparator`'s hash, with per-bucket chains resolved by
    /// `comparator.equal`.
    Hash {
        comparator: Comparator,
        buckets: HashMap<u64, Vec<Entry>>,
    },
}

struct Entry {
    key: Vec<u8>,
    lru_slot: Option<usize>,
}

impl UniquenessSet {
    /// An unbounded set ordered by `comparator`.
    pub fn ordered_unique(comparator: Comparator) -> UniquenessSet {
        UniquenessSet {
            backing: Backing::Ordered {
                comparator,
                entries: Vec::new(),
            },
            lru: None,
            capacity: 0,
        }
    }

    /// An unbounded set hashed by `comparator`.
    pub fn hash_unique(comparator: Comparator) -> UniquenessSet {
        UniquenessSet {
            backing: Backing::Hash {
                comparator,
                buckets: HashMap::new(),
            },
            lru: None,
            capacity: 0,
        }
    }

    /// An LRU-bounded ordered set of capacity `n` (`n == 0` is raised to
    /// 1).
    pub fn forgetful_ordered(comparator: Comparator, n: usize) -> UniquenessSet {
        let capacity = n.max(1);
        UniquenessSet {
            backing: Backing::Ordered {
                comparator,
                entries: Vec::with_capacity(capacity + 1),
            },
            lru: Some(LruList::new()),
            capacity,
        }
    }

    /// An LRU-bounded hash set of capacity `n` (`n == 0` is raised to 1).
    /// The bucket map is pre-reserved to `n + 1` so it never rehashes
    /// while the set is in use; individual buckets are plain `Vec`s, so
    /// this only guarantees the bucket map itself stays put, not that no
    /// bucket ever reallocates.
    pub fn forgetful_hash(comparator: Comparator, n: usize) -> UniquenessSet {
        let capacity = n.max(1);
        UniquenessSet {
            backing: Backing::Hash {
                comparator,
                buckets: HashMap::with_capacity(capacity + 1),
            },
            lru: Some(LruList::new()),
            capacity,
        }
    }

    /// Attempt to insert `key`. Returns `true` if `key` was not already
    /// present (a "new" element the caller should keep), `false` if it
    /// was a duplicate (the caller should drop its token). Refreshes the
    /// LRU position of an existing match on a bounded set.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        match &mut self.backing {
            Backing::Ordered { comparator, entries } => {
                match entries.binary_search_by(|e| comparator.cmp_for_search(&e.key, key)) {
                    Ok(idx) => {
                        if let (Some(lru), Some(slot)) = (&mut self.lru, entries[idx].lru_slot) {
                            lru.move_to_front(slot);
                        }
                        false
                    }
                    Err(pos) => {
                        let lru_slot = self.lru.as_mut().map(|lru| lru.push_front(key.to_vec()));
                        entries.insert(
                            pos,
                            Entry {
                                key: key.to_vec(),
                                lru_slot,
                            },
                        );
                        evict_if_over_capacity(&mut self.lru, self.capacity, &mut self.backing);
                        true
                    }
                }
            }
            Backing::Hash { comparator, buckets } => {
                let hash = comparator.hash(key);
                let bucket = buckets.entry(hash).or_insert_with(Vec::new);
                if let Some(existing) = bucket.iter().find(|e| comparator.equal(&e.key, key)) {
                    if let (Some(lru), Some(slot)) = (&mut self.lru, existing.lru_slot) {
                        lru.move_to_front(slot);
                    }
                    false
                } else {
                    let lru_slot = self.lru.as_mut().map(|lru| lru.push_front(key.to_vec()));
                    bucket.push(Entry {
                        key: key.to_vec(),
                        lru_slot,
                    });
                    evict_if_over_capacity(&mut self.lru, self.capacity, &mut self.backing);
                    true
                }
            }
        }
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Ordered { entries, .. } => entries.len(),
            Backing::Hash { buckets, .. } => buckets.values().map(Vec::len).sum(),
        }
    }

    /// Returns true if and only if the set holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Comparator {
    fn cmp_for_search(&self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        if self.equal(a, b) {
            std::cmp::Ordering::Equal
        } else if self.less(a, b) {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    }
}

fn evict_if_over_capacity(lru: &mut Option<LruList>, capacity: usize, backing: &mut Backing) {
    let lru = match lru {
        Some(lru) => lru,
        None => return,
    };
    if lru.len() <= capacity {
        return;
    }
    let (_, evicted_key) = match lru.pop_back() {
        Some(pair) => pair,
        None => return,
    };
    match backing {
        Backing::Ordered { comparator, entries } => {
            if let Ok(idx) =
                entries.binary_search_by(|e| comparator.cmp_for_search(&e.key, &evicted_key))
            {
                entries.remove(idx);
            }
        }
        Backing::Hash { comparator, buckets } => {
            let hash = comparator.hash(&evicted_key);
            if let Some(bucket) = buckets.get_mut(&hash) {
                bucket.retain(|e| !comparator.equal(&e.key, &evicted_key));
            }
        }
    }
}

/// An arena-backed doubly linked list: front is most-recently-used, back
/// is next to be evicted. Freed slots are recycled so the arena never
/// grows past the set's capacity.
struct LruList {
    nodes: Vec<LruNode>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Vec<usize>,
    len: usize,
}

struct LruNode {
    prev: Option<usize>,
    next: Option<usize>,
    key: Vec<u8>,
}

impl LruList {
    fn new() -> LruList {
        LruList {
            nodes: Vec::new(),
            head: None,
            tail: None,
            free: Vec::new(),
            len: 0,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn alloc(&mut self, node: LruNode) -> usize {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn push_front(&mut self, key: Vec<u8>) -> usize {
        let slot = self.alloc(LruNode {
            prev: None,
            next: self.head,
            key,
        });
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.len += 1;
        slot
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    /// Relink `slot` at the front without reallocating it, so any
    /// `Entry::lru_slot` pointing at it stays valid.
    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.len += 1;
    }

    fn pop_back(&mut self) -> Option<(usize, Vec<u8>)> {
        let tail = self.tail?;
        self.unlink(tail);
        let key = std::mem::take(&mut self.nodes[tail].key);
        self.free.push(tail);
        Some((tail, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_unique_rejects_duplicates() {
        let mut set = UniquenessSet::hash_unique(Comparator::Lexicographic);
        assert!(set.insert(b"a"));
        assert!(set.insert(b"b"));
        assert!(!set.insert(b"a"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ordered_unique_numeric_equivalence() {
        let mut set = UniquenessSet::ordered_unique(Comparator::Numeric);
        assert!(set.insert(b"7"));
        assert!(!set.insert(b"007"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn forgetful_hash_evicts_least_recently_used() {
        let mut set = UniquenessSet::forgetful_hash(Comparator::Lexicographic, 2);
        assert!(set.insert(b"a"));
        assert!(set.insert(b"b"));
        assert!(set.insert(b"c")); // evicts "a"
        assert_eq!(set.len(), 2);
        assert!(set.insert(b"a")); // "a" was evicted, so this is new again
        assert!(!set.insert(b"c"));
    }

    #[test]
    fn forgetful_refresh_keeps_element_alive() {
        let mut set = UniquenessSet::forgetful_hash(Comparator::Lexicographic, 2);
        assert!(set.insert(b"a"));
        assert!(set.insert(b"b"));
        assert!(!set.insert(b"a")); // refresh: "a" is now most recent
        assert!(set.insert(b"c")); // should evict "b", not "a"
        assert!(!set.insert(b"a"));
        assert!(set.len() == 2);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut set = UniquenessSet::forgetful_ordered(Comparator::Lexicographic, 0);
        assert!(set.insert(b"x"));
        assert!(set.insert(b"y"));
        assert_eq!(set.len(), 1);
    }
}
