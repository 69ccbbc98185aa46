//! Per-frame memoization of view-derived values.

use std::cell::OnceCell;

use crate::geo::Location;

/// Values computed at most once per frame.
///
/// A memo belongs to exactly one [`RenderContext`](super::RenderContext) and is
/// reset whenever that context's camera changes.
#[derive(Debug, Default)]
pub struct FrameMemo {
    look_at_location: OnceCell<Location>,
    look_at_pixel_size: OnceCell<f64>,
    label_offset: OnceCell<f64>,
}

impl FrameMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn look_at_location(&self, compute: impl FnOnce() -> Location) -> Location {
        *self.look_at_location.get_or_init(compute)
    }

    pub fn look_at_pixel_size(&self, compute: impl FnOnce() -> f64) -> f64 {
        *self.look_at_pixel_size.get_or_init(compute)
    }

    pub fn label_offset(&self, compute: impl FnOnce() -> f64) -> f64 {
        *self.label_offset.get_or_init(compute)
    }

    /// Forget every memoized value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when nothing has been computed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.look_at_location.get().is_none()
            && self.look_at_pixel_size.get().is_none()
            && self.label_offset.get().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once() {
        let memo = FrameMemo::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            2.5
        };
        assert_eq!(memo.look_at_pixel_size(compute), 2.5);
        assert_eq!(memo.look_at_pixel_size(|| unreachable!()), 2.5);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_clear_resets() {
        let mut memo = FrameMemo::new();
        memo.look_at_location(|| Location::new(1.0, 2.0));
        assert!(!memo.is_empty());
        memo.clear();
        assert!(memo.is_empty());
        assert_eq!(memo.look_at_location(|| Location::new(3.0, 4.0)), Location::new(3.0, 4.0));
    }
}
