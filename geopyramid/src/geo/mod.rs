//! Geographic primitives.
//!
//! Provides locations, positions (location plus altitude) and sectors
//! (axis-aligned latitude/longitude rectangles). All angles are in degrees.

mod location;
mod sector;

pub use location::{Location, Position};
pub use sector::Sector;

/// Clamps a value to the inclusive range `[min, max]`.
#[inline]
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
