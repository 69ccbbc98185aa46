//! The elevation model seen by tile bounds and LOD tests.

use crate::geo::Sector;
use crate::timestamp::Timestamp;

/// A queryable source of terrain heights.
pub trait ElevationModel {
    /// Changes whenever the heights this model reports may have changed.
    fn timestamp(&self) -> Timestamp;

    /// Minimum and maximum height in meters over `sector`.
    ///
    /// Returns an inverted range (`min > max`) when the model has no data for
    /// the sector.
    fn height_limits(&self, sector: &Sector) -> (f32, f32);
}

/// An elevation model that is zero everywhere and never changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatElevationModel;

impl ElevationModel for FlatElevationModel {
    fn timestamp(&self) -> Timestamp {
        Timestamp::ZERO
    }

    fn height_limits(&self, _sector: &Sector) -> (f32, f32) {
        (0.0, 0.0)
    }
}

/// Inverted limits reported where a model has no data.
pub(crate) const NO_DATA_LIMITS: (f32, f32) = (f32::MAX, -f32::MAX);
