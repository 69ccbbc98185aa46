//! Caches.
//!
//! - [`ReuseCache`]: single-threaded strict LRU bounded by entry weight, used
//!   by the level-of-detail pass to memoize tile subdivisions.
//! - [`ContentCache`]: async, shareable store of raw tile bodies consulted by
//!   retrieval tasks. [`MemoryContentCache`] is the in-memory implementation.

mod content;
mod lru;

pub use content::{CachedContent, ContentCache, ContentCacheStats, MemoryContentCache};
pub use lru::ReuseCache;
