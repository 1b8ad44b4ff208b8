//! Bounded least-recently-used statement cache.
//!
//! Entries live in a dense arena (`slots`) and are threaded into a doubly
//! linked recency list by slot index, newest to oldest. A key → slot map
//! gives O(1) lookup; touching, inserting and evicting are O(1) as well.
//! Removing an entry swaps the last slot into the hole and patches the moved
//! node's neighbours, so the arena never holds empty slots.

use super::traits::{CacheStats, Release};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{debug, trace, warn};

struct Node<H> {
    key: String,
    handle: H,
    /// Slot of the next more recently used entry.
    newer: Option<usize>,
    /// Slot of the next less recently used entry.
    older: Option<usize>,
}

/// A handle checked out of the cache for one use.
///
/// `Resident` borrows a handle the cache keeps. `Transient` owns a handle
/// the cache declined to keep (capacity 0); [`finish`](Lease::finish)
/// releases it.
#[derive(Debug)]
pub enum Lease<'a, H: Release> {
    Resident(&'a mut H),
    Transient(H),
}

impl<H: Release> Lease<'_, H> {
    /// Whether the handle is held by the cache.
    pub fn is_resident(&self) -> bool {
        matches!(self, Lease::Resident(_))
    }

    /// Return the handle. Transient handles are released here; dropping a
    /// lease without calling this drops a transient handle unreleased.
    pub fn finish(self) {
        if let Lease::Transient(handle) = self {
            if let Err(err) = handle.release() {
                warn!(error = %err, "Failed to release uncached statement");
            }
        }
    }
}

impl<H: Release> Deref for Lease<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        match self {
            Lease::Resident(handle) => handle,
            Lease::Transient(handle) => handle,
        }
    }
}

impl<H: Release> DerefMut for Lease<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        match self {
            Lease::Resident(handle) => handle,
            Lease::Transient(handle) => handle,
        }
    }
}

/// LRU cache from SQL text to prepared statement handles.
///
/// Holds at most `capacity` handles. Insertion only follows a successful
/// factory call, so every resident handle prepared successfully for its key.
pub struct StatementCache<H: Release> {
    capacity: usize,
    index: HashMap<String, usize>,
    slots: Vec<Node<H>>,
    newest: Option<usize>,
    oldest: Option<usize>,
    stats: CacheStats,
}

impl<H: Release> StatementCache<H> {
    /// Create an empty cache. A capacity of 0 retains nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::new(),
            slots: Vec::new(),
            newest: None,
            oldest: None,
            stats: CacheStats::default(),
        }
    }

    /// Look up `key`, calling `factory` on a miss.
    ///
    /// A hit marks `key` most recently used and never calls `factory`. On a
    /// miss, a successful handle is inserted as most recently used, evicting
    /// the least recently used entry first when the cache is full. A factory
    /// error is returned unchanged and leaves the cache exactly as it was.
    pub fn get_or_create<E, F>(&mut self, key: &str, factory: F) -> Result<Lease<'_, H>, E>
    where
        F: FnOnce() -> Result<H, E>,
    {
        if let Some(&slot) = self.index.get(key) {
            self.stats.hits += 1;
            trace!(sql = key, "Statement cache hit");
            self.touch(slot);
            return Ok(Lease::Resident(&mut self.slots[slot].handle));
        }

        self.stats.misses += 1;
        trace!(sql = key, "Statement cache miss");
        let handle = factory()?;

        if self.capacity == 0 {
            return Ok(Lease::Transient(handle));
        }
        if self.index.len() >= self.capacity {
            self.evict_oldest();
        }

        let slot = self.insert_newest(key.to_string(), handle);
        debug!(sql = key, size = self.slots.len(), "Cached prepared statement");
        Ok(Lease::Resident(&mut self.slots[slot].handle))
    }

    /// Remove `key` if present, releasing its handle.
    ///
    /// Returns whether an entry was removed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        let Some(&slot) = self.index.get(key) else {
            return false;
        };
        let node = self.remove_slot(slot);
        self.stats.invalidations += 1;
        debug!(sql = key, "Invalidated cached statement");
        self.release(node);
        true
    }

    /// Remove and release every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        let count = self.slots.len();
        self.index.clear();
        self.newest = None;
        self.oldest = None;
        for node in std::mem::take(&mut self.slots) {
            self.release(node);
        }
        if count > 0 {
            debug!("Cleared {} cached statements", count);
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `key` is resident. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Resident keys, most recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::successors(self.newest, move |&slot| self.slots[slot].older)
            .map(move |slot| self.slots[slot].key.as_str())
    }

    /// The key that would be evicted next.
    pub fn least_recent(&self) -> Option<&str> {
        self.oldest.map(|slot| self.slots[slot].key.as_str())
    }

    /// The key that was touched last.
    pub fn most_recent(&self) -> Option<&str> {
        self.newest.map(|slot| self.slots[slot].key.as_str())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.slots.len(),
            capacity: self.capacity,
            ..self.stats
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.newest != Some(slot) {
            self.unlink(slot);
            self.link_newest(slot);
        }
    }

    fn insert_newest(&mut self, key: String, handle: H) -> usize {
        let slot = self.slots.len();
        self.index.insert(key.clone(), slot);
        self.slots.push(Node {
            key,
            handle,
            newer: None,
            older: None,
        });
        self.link_newest(slot);
        slot
    }

    fn evict_oldest(&mut self) {
        if let Some(slot) = self.oldest {
            let node = self.remove_slot(slot);
            self.stats.evictions += 1;
            debug!(sql = %node.key, "Evicted least recently used statement");
            self.release(node);
        }
    }

    fn link_newest(&mut self, slot: usize) {
        let previous = self.newest;
        self.slots[slot].newer = None;
        self.slots[slot].older = previous;
        match previous {
            Some(prev) => self.slots[prev].newer = Some(slot),
            None => self.oldest = Some(slot),
        }
        self.newest = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (newer, older) = (self.slots[slot].newer, self.slots[slot].older);
        match newer {
            Some(n) => self.slots[n].older = older,
            None => self.newest = older,
        }
        match older {
            Some(o) => self.slots[o].newer = newer,
            None => self.oldest = newer,
        }
    }

    /// Detach the node at `slot` from the list, the index and the arena.
    fn remove_slot(&mut self, slot: usize) -> Node<H> {
        self.unlink(slot);
        let node = self.slots.swap_remove(slot);
        self.index.remove(&node.key);

        // The former last node now lives at `slot`; repoint its neighbours.
        if slot < self.slots.len() {
            let (newer, older) = (self.slots[slot].newer, self.slots[slot].older);
            match newer {
                Some(n) => self.slots[n].older = Some(slot),
                None => self.newest = Some(slot),
            }
            match older {
                Some(o) => self.slots[o].newer = Some(slot),
                None => self.oldest = Some(slot),
            }
            if let Some(entry) = self.index.get_mut(&self.slots[slot].key) {
                *entry = slot;
            }
        }
        node
    }

    fn release(&mut self, node: Node<H>) {
        if let Err(err) = node.handle.release() {
            self.stats.release_failures += 1;
            warn!(sql = %node.key, error = %err, "Failed to release prepared statement");
        }
    }
}

impl<H: Release> Drop for StatementCache<H> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<H: Release> fmt::Debug for StatementCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache")
            .field("len", &self.slots.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SqlTagError};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the id of every handle released.
    type ReleaseLog = Rc<RefCell<Vec<u32>>>;

    #[derive(Debug)]
    struct FakeHandle {
        id: u32,
        log: ReleaseLog,
        fail_release: bool,
    }

    impl Release for FakeHandle {
        fn release(self) -> Result<()> {
            self.log.borrow_mut().push(self.id);
            if self.fail_release {
                return Err(SqlTagError::Release {
                    sql: format!("handle {}", self.id),
                    message: "busy".into(),
                    source: None,
                });
            }
            Ok(())
        }
    }

    fn handle(id: u32, log: &ReleaseLog) -> std::result::Result<FakeHandle, String> {
        Ok(FakeHandle {
            id,
            log: log.clone(),
            fail_release: false,
        })
    }

    fn get(cache: &mut StatementCache<FakeHandle>, key: &str, id: u32, log: &ReleaseLog) -> u32 {
        cache.get_or_create(key, || handle(id, log)).unwrap().id
    }

    fn keys(cache: &StatementCache<FakeHandle>) -> Vec<&str> {
        cache.keys().collect()
    }

    #[test]
    fn test_hit_skips_factory() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(4);

        assert_eq!(get(&mut cache, "a", 1, &log), 1);
        let lease = cache
            .get_or_create("a", || -> std::result::Result<FakeHandle, String> {
                panic!("factory must not run on a hit")
            })
            .unwrap();
        assert!(lease.is_resident());
        assert_eq!(lease.id, 1);
        drop(lease);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[test]
    fn test_evicts_first_inserted_when_full() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(3);

        for (id, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            get(&mut cache, key, id as u32, &log);
            assert!(cache.len() <= cache.capacity());
        }

        assert_eq!(keys(&cache), vec!["d", "c", "b"]);
        assert!(!cache.contains("a"));
        assert_eq!(*log.borrow(), vec![0]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_touch_resets_recency() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(3);

        get(&mut cache, "A", 1, &log);
        get(&mut cache, "B", 2, &log);
        get(&mut cache, "C", 3, &log);
        get(&mut cache, "A", 99, &log);
        assert_eq!(cache.least_recent(), Some("B"));

        get(&mut cache, "D", 4, &log);
        assert!(cache.contains("A"));
        assert!(!cache.contains("B"));
        assert_eq!(keys(&cache), vec!["D", "A", "C"]);
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn test_factory_error_leaves_cache_unchanged() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(2);
        get(&mut cache, "a", 1, &log);
        get(&mut cache, "b", 2, &log);
        let before: Vec<String> = cache.keys().map(String::from).collect();

        let result = cache.get_or_create("broken", || Err::<FakeHandle, _>("syntax error".to_string()));
        assert_eq!(result.unwrap_err(), "syntax error");

        assert_eq!(cache.len(), 2);
        assert_eq!(keys(&cache), before);
        assert!(log.borrow().is_empty(), "a failed creation must not evict");

        // Never cached, so the next attempt calls the factory again.
        let mut calls = 0;
        let _ = cache.get_or_create("broken", || {
            calls += 1;
            Err::<FakeHandle, _>("syntax error".to_string())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_capacity_never_retains() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(0);
        let mut calls = 0;

        for id in 0..3 {
            let lease = cache
                .get_or_create("same", || {
                    calls += 1;
                    handle(id, &log)
                })
                .unwrap();
            assert!(!lease.is_resident());
            lease.finish();
            assert_eq!(cache.len(), 0);
        }

        assert_eq!(calls, 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_capacity_one() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(1);
        get(&mut cache, "x", 1, &log);
        get(&mut cache, "y", 2, &log);
        get(&mut cache, "y", 3, &log);
        assert_eq!(keys(&cache), vec!["y"]);
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn test_invalidate() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(3);
        get(&mut cache, "a", 1, &log);
        get(&mut cache, "b", 2, &log);
        get(&mut cache, "c", 3, &log);

        assert!(cache.invalidate("b"));
        assert!(!cache.invalidate("b"));
        assert!(!cache.invalidate("never-seen"));
        assert_eq!(keys(&cache), vec!["c", "a"]);
        assert_eq!(cache.stats().invalidations, 1);
        assert_eq!(*log.borrow(), vec![2]);

        // Re-creating after invalidation calls the factory.
        assert_eq!(get(&mut cache, "b", 20, &log), 20);
        assert_eq!(keys(&cache), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_arena_stays_consistent_under_churn() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(4);
        let mut id = 0;
        for round in 0..50u32 {
            let key = format!("q{}", round % 7);
            id += 1;
            get(&mut cache, &key, id, &log);
            if round % 5 == 0 {
                cache.invalidate(&format!("q{}", (round + 3) % 7));
            }

            let listed: Vec<&str> = cache.keys().collect();
            assert_eq!(listed.len(), cache.len());
            assert!(cache.len() <= 4);
            assert_eq!(listed.first().copied(), cache.most_recent());
            assert_eq!(listed.last().copied(), cache.least_recent());
            for key in listed {
                assert!(cache.contains(key));
            }
        }
    }

    #[test]
    fn test_clear_releases_everything() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(5);
        get(&mut cache, "a", 1, &log);
        get(&mut cache, "b", 2, &log);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.capacity(), 5);
        assert_eq!(cache.most_recent(), None);
        assert_eq!(log.borrow().len(), 2);

        get(&mut cache, "c", 3, &log);
        assert_eq!(keys(&cache), vec!["c"]);
    }

    #[test]
    fn test_release_failure_does_not_block_insertion() {
        let log = ReleaseLog::default();
        let mut cache = StatementCache::new(1);
        cache
            .get_or_create("a", || {
                Ok::<_, String>(FakeHandle {
                    id: 1,
                    log: log.clone(),
                    fail_release: true,
                })
            })
            .unwrap();

        assert_eq!(get(&mut cache, "b", 2, &log), 2);
        assert_eq!(keys(&cache), vec!["b"]);
        assert_eq!(cache.stats().release_failures, 1);
    }

    #[test]
    fn test_drop_releases_resident_handles() {
        let log = ReleaseLog::default();
        {
            let mut cache = StatementCache::new(3);
            get(&mut cache, "a", 1, &log);
            get(&mut cache, "b", 2, &log);
        }
        let mut released = log.borrow().clone();
        released.sort_unstable();
        assert_eq!(released, vec![1, 2]);
    }
}
