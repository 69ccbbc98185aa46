//! Bounded, weight-aware, strict LRU cache.
//!
//! Used to memoize tile subdivisions across frames, but generic over key and
//! value. Entries live in a slab of slots linked into a recency list; a hash
//! map points from key to slot, so lookups, promotions, insertions and
//! evictions are all O(1).
//!
//! # Capacity
//!
//! Every entry carries a caller-supplied weight, usually a byte estimate. The
//! sum of resident weights never exceeds the capacity. Inserting evicts from
//! the least recently used end until the new entry fits. An entry heavier than
//! the whole capacity is never retained.
//!
//! # Threading
//!
//! Not synchronized. The cache is owned by the render loop that walks the
//! tile pyramid and is only ever mutated from there.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

const NIL: usize = usize::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    weight: usize,
    prev: usize,
    next: usize,
}

/// Strict least-recently-used cache bounded by total entry weight.
pub struct ReuseCache<K, V> {
    capacity: usize,
    used: usize,
    index: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    /// Most recently used.
    head: usize,
    /// Least recently used.
    tail: usize,
    evictions: u64,
}

impl<K, V> ReuseCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty cache that holds at most `capacity` units of weight.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total weight of resident entries.
    pub fn used_capacity(&self) -> usize {
        self.used
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of entries evicted to make room since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.detach(slot);
        self.attach_front(slot);
        self.slots[slot].as_ref().map(|entry| &entry.value)
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|entry| &entry.value)
    }

    /// Check for `key` without touching its recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace `key` as the most recently used entry.
    ///
    /// Evicts least recently used entries until `weight` fits. When `weight`
    /// exceeds the whole capacity nothing is stored and any previous entry
    /// for `key` is dropped.
    ///
    /// Returns the keys evicted to make room, least recently used first.
    pub fn put(&mut self, key: K, value: V, weight: usize) -> Vec<K> {
        self.remove(&key);

        if weight > self.capacity {
            trace!(
                weight,
                capacity = self.capacity,
                "entry heavier than cache capacity, not retained"
            );
            return Vec::new();
        }

        let evicted = self.evict_until_fits(weight);

        let entry = Slot {
            key: key.clone(),
            value,
            weight,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.attach_front(slot);
        self.index.insert(key, slot);
        self.used += weight;
        evicted
    }

    /// Change the capacity, evicting least recently used entries that no
    /// longer fit. Returns the evicted keys.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<K> {
        self.capacity = capacity;
        self.evict_until_fits(0)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.detach(slot);
        let entry = self.slots[slot].take()?;
        self.free.push(slot);
        self.used -= entry.weight;
        Some(entry.value)
    }

    /// Drop every entry. Capacity and the eviction count are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.used = 0;
    }

    /// Entries in no particular order, without touching recency.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .flatten()
            .map(|entry| (&entry.key, &entry.value))
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let entry = self.slots.get(cursor)?.as_ref()?;
            cursor = entry.next;
            Some(&entry.key)
        })
    }

    fn evict_until_fits(&mut self, weight: usize) -> Vec<K> {
        let mut evicted = Vec::new();
        while self.used + weight > self.capacity && self.tail != NIL {
            match self.evict_tail() {
                Some(key) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }

    fn evict_tail(&mut self) -> Option<K> {
        let slot = self.tail;
        let key = self.slots.get(slot)?.as_ref()?.key.clone();
        self.remove(&key)?;
        self.evictions += 1;
        trace!(used = self.used, "evicted least recently used entry");
        Some(key)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = match self.slots[slot].as_ref() {
            Some(entry) => (entry.prev, entry.next),
            None => return,
        };
        match prev {
            NIL => self.head = next,
            p => {
                if let Some(entry) = self.slots[p].as_mut() {
                    entry.next = next;
                }
            }
        }
        match next {
            NIL => self.tail = prev,
            n => {
                if let Some(entry) = self.slots[n].as_mut() {
                    entry.prev = prev;
                }
            }
        }
    }

    fn attach_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = NIL;
            entry.next = old_head;
        }
        if old_head != NIL {
            if let Some(entry) = self.slots[old_head].as_mut() {
                entry.prev = slot;
            }
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }
}

impl<K, V> std::fmt::Debug for ReuseCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReuseCache")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("entries", &self.index.len())
            .field("evictions", &self.evictions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    fn keys_of(cache: &ReuseCache<u32, u32>) -> Vec<u32> {
        cache.keys().copied().collect()
    }

    #[test]
    fn test_get_returns_inserted_value() {
        let mut cache = ReuseCache::new(10);
        cache.put(1u32, "one", 1);
        assert_eq!(cache.get(&1), Some(&"one"));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_evicts_least_recently_used_first() {
        let mut cache = ReuseCache::new(3);
        cache.put(1u32, 10u32, 1);
        cache.put(2, 20, 1);
        cache.put(3, 30, 1);

        // Touch 1 so 2 becomes the oldest.
        cache.get(&1);
        cache.put(4, 40, 1);

        assert!(cache.get(&2).is_none());
        assert_eq!(keys_of(&cache), vec![4, 1, 3]);
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_put_reports_evicted_keys() {
        let mut cache = ReuseCache::new(4);
        assert!(cache.put(1u32, 1u32, 2).is_empty());
        assert!(cache.put(2, 2, 2).is_empty());
        assert_eq!(cache.put(3, 3, 3), vec![1, 2]);
        assert!(cache.put(4, 4, 9).is_empty());
    }

    #[test]
    fn test_peek_leaves_recency_alone() {
        let mut cache = ReuseCache::new(2);
        cache.put(1u32, 10u32, 1);
        cache.put(2, 20, 1);
        assert_eq!(cache.peek(&1), Some(&10));
        assert_eq!(cache.put(3, 30, 1), vec![1]);
        assert_eq!(cache.peek(&1), None);
    }

    #[test]
    fn test_shrinking_capacity_evicts_oldest() {
        let mut cache = ReuseCache::new(10);
        for key in 0..4u32 {
            cache.put(key, key, 2);
        }
        assert_eq!(cache.set_capacity(5), vec![0, 1]);
        assert_eq!(cache.capacity(), 5);
        assert_eq!(cache.used_capacity(), 4);
        assert!(cache.set_capacity(100).is_empty());

        let mut entries: Vec<(u32, u32)> = cache.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort();
        assert_eq!(entries, vec![(2, 2), (3, 3)]);
    }

    #[test]
    fn test_heavy_insert_evicts_several() {
        let mut cache = ReuseCache::new(10);
        for key in 0..5u32 {
            cache.put(key, key, 2);
        }
        cache.put(99, 99, 5);
        // 0, 1 and 2 go, oldest first, freeing 6 units.
        assert_eq!(keys_of(&cache), vec![99, 4, 3]);
        assert_eq!(cache.used_capacity(), 9);
    }

    #[test]
    fn test_entry_heavier_than_capacity_not_retained() {
        let mut cache = ReuseCache::new(4);
        cache.put(1u32, 1u32, 2);
        cache.put(2, 2, 5);
        assert!(!cache.contains_key(&2));
        assert_eq!(keys_of(&cache), vec![1]);

        // Replacing an existing key with an oversized value drops it.
        cache.put(1, 100, 5);
        assert!(cache.is_empty());
        assert_eq!(cache.used_capacity(), 0);
    }

    #[test]
    fn test_replace_updates_weight() {
        let mut cache = ReuseCache::new(10);
        cache.put(1u32, 1u32, 4);
        cache.put(1, 2, 6);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_capacity(), 6);
        assert_eq!(cache.get(&1), Some(&2));
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut cache = ReuseCache::new(10);
        cache.put(1u32, 1u32, 1);
        cache.put(2, 2, 1);
        assert_eq!(cache.remove(&1), Some(1));
        assert_eq!(cache.remove(&1), None);
        cache.put(3, 3, 1);
        assert_eq!(keys_of(&cache), vec![3, 2]);
        assert_eq!(cache.used_capacity(), 2);
    }

    #[test]
    fn test_clear() {
        let mut cache = ReuseCache::new(10);
        cache.put(1u32, 1u32, 3);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.used_capacity(), 0);
        cache.put(2, 2, 3);
        assert_eq!(keys_of(&cache), vec![2]);
    }

    #[test]
    fn test_random_workload_matches_model() {
        // Reference model: a Vec ordered most recent first.
        let mut rng = rand::rng();
        let mut cache = ReuseCache::new(50);
        let mut model: Vec<(u32, usize)> = Vec::new();

        for _ in 0..2000 {
            let key = rng.random_range(0..40u32);
            if rng.random_bool(0.5) {
                let hit = cache.get(&key).is_some();
                let position = model.iter().position(|(k, _)| *k == key);
                assert_eq!(hit, position.is_some());
                if let Some(position) = position {
                    let entry = model.remove(position);
                    model.insert(0, entry);
                }
            } else {
                let weight = rng.random_range(1..=12usize);
                cache.put(key, key, weight);
                model.retain(|(k, _)| *k != key);
                let mut used: usize = model.iter().map(|(_, w)| w).sum();
                while used + weight > 50 {
                    if let Some((_, w)) = model.pop() {
                        used -= w;
                    }
                }
                model.insert(0, (key, weight));
            }
            let expected: Vec<u32> = model.iter().map(|(k, _)| *k).collect();
            assert_eq!(keys_of(&cache), expected);
        }
    }

    proptest! {
        #[test]
        fn prop_resident_weight_within_capacity(
            capacity in 1usize..100,
            ops in prop::collection::vec((0u32..20, 0usize..40), 1..200),
        ) {
            let mut cache = ReuseCache::new(capacity);
            for (key, weight) in ops {
                cache.put(key, key, weight);
                prop_assert!(cache.used_capacity() <= capacity);
                prop_assert_eq!(cache.keys().count(), cache.len());
            }
        }

        #[test]
        fn prop_evicted_keys_are_gone(keys in prop::collection::vec(0u32..1000, 1..100)) {
            let mut cache = ReuseCache::new(5);
            for key in &keys {
                cache.put(*key, *key, 1);
            }
            let resident: Vec<u32> = cache.keys().copied().collect();
            for key in &keys {
                prop_assert_eq!(cache.contains_key(key), resident.contains(key));
            }
        }
    }
}
