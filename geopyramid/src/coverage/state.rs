//! Per-tile retrieval state and coverage statistics.

use std::fmt;

/// Retrieval state of one tile key.
///
/// ```text
/// NotRequested ──► Pending ──┬──► Succeeded
///      ▲                     └──► Failed ──► (requested again) Pending
///      └──────── invalidate_tiles() ◄──── any state
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileState {
    #[default]
    NotRequested,
    /// A retrieval is in flight. No second one is issued for the same key.
    Pending,
    /// Content is resident.
    Succeeded,
    /// The last retrieval failed. The next pass that needs the tile retries.
    Failed,
}

impl TileState {
    /// Whether a pass needing this tile should issue a retrieval.
    pub fn is_requestable(&self) -> bool {
        matches!(self, TileState::NotRequested | TileState::Failed)
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TileState::NotRequested => "not requested",
            TileState::Pending => "pending",
            TileState::Succeeded => "succeeded",
            TileState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot of a coverage's retrieval activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageStats {
    /// Keys with a retrieval in flight.
    pub pending: usize,
    /// Keys with resident content.
    pub succeeded: usize,
    /// Keys whose last retrieval failed.
    pub failed: usize,
    /// Retrievals issued since the coverage was created.
    pub requests_issued: u64,
}

impl fmt::Display for CoverageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pending={} succeeded={} failed={} requests={}",
            self.pending, self.succeeded, self.failed, self.requests_issued
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requestable_states() {
        assert!(TileState::NotRequested.is_requestable());
        assert!(TileState::Failed.is_requestable());
        assert!(!TileState::Pending.is_requestable());
        assert!(!TileState::Succeeded.is_requestable());
    }

    #[test]
    fn test_default_is_not_requested() {
        assert_eq!(TileState::default(), TileState::NotRequested);
    }

    #[test]
    fn test_stats_display() {
        let stats = CoverageStats {
            pending: 3,
            succeeded: 10,
            failed: 1,
            requests_issued: 14,
        };
        assert_eq!(
            stats.to_string(),
            "pending=3 succeeded=10 failed=1 requests=14"
        );
    }
}
