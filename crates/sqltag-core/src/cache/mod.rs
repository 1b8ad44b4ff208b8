//! Prepared statement caching.
//!
//! [`StatementCache`] maps SQL text to prepared statement handles with a
//! fixed capacity and least-recently-used eviction. It knows nothing about
//! the engine beyond the [`Release`] trait its handles implement.

mod lru;
mod traits;

pub use lru::{Lease, StatementCache};
pub use traits::{CacheStats, Release};
