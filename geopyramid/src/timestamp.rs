//! Process-wide monotonic content timestamps.
//!
//! Coverages bump their timestamp whenever resident content changes; tiles
//! remember the timestamp their cached bounds were computed against and
//! recompute on mismatch. Timestamps are only meaningful for equality; the
//! numeric gap between two of them carries no information.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

/// An opaque, monotonically issued timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The timestamp of content that has never changed.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Issue a new timestamp, distinct from every one issued before.
    pub fn next() -> Self {
        Timestamp(NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_is_unique() {
        let a = Timestamp::next();
        let b = Timestamp::next();
        assert_ne!(a, b);
        assert_ne!(a, Timestamp::ZERO);
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Timestamp::default(), Timestamp::ZERO);
    }

    #[test]
    fn test_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| Timestamp::next()).collect::<Vec<_>>()))
            .collect();
        let mut all = std::collections::HashSet::new();
        for handle in handles {
            for ts in handle.join().unwrap() {
                assert!(all.insert(ts), "duplicate timestamp {}", ts);
            }
        }
        assert_eq!(all.len(), 400);
    }
}
