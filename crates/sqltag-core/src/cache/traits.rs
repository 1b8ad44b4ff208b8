//! Handle release trait and cache statistics.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A cached handle that owns engine-side resources.
///
/// The cache calls [`release`](Release::release) whenever it gives up a
/// handle: on eviction, invalidation, [`clear`](super::StatementCache::clear),
/// and after a handle that was never cached has been used once. A failed
/// release is logged and counted; it never blocks the cache operation that
/// triggered it.
pub trait Release: Sized {
    /// Free the handle's engine-side resources.
    fn release(self) -> Result<()>;
}

/// Counters describing statement cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of resident entries.
    pub size: usize,
    /// Maximum number of resident entries.
    pub capacity: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that called the factory (successfully or not).
    pub misses: u64,
    /// Entries removed to make room for a new one.
    pub evictions: u64,
    /// Entries removed by [`invalidate`](super::StatementCache::invalidate).
    pub invalidations: u64,
    /// Handles whose release reported an error.
    pub release_failures: u64,
}
