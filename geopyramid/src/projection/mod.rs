//! Map projections from geographic coordinates to renderable Cartesian space.
//!
//! Two flat projections are modeled:
//!
//! - [`EquirectangularProjection`]: plate carrée, `x = R·λ`, `y = R·φ`
//! - [`MercatorProjection`]: ellipsoidal Mercator with a series inverse
//!
//! Both share the [`GeographicProjection`] trait and are normally used through
//! a [`Globe`], which pairs a projection with its [`Ellipsoid`].
//!
//! Heights map to the `z` axis in meters in both projections.

mod equirectangular;
mod globe;
mod mercator;
mod vec;

pub use equirectangular::EquirectangularProjection;
pub use globe::{Ellipsoid, Globe};
pub use mercator::MercatorProjection;
pub use vec::Vec3;

use crate::geo::{Position, Sector};

/// Conversion between geographic and Cartesian coordinates.
///
/// Implementations are pure math and hold no mutable state.
pub trait GeographicProjection: Send + Sync {
    /// Short human-readable name for logging.
    fn name(&self) -> &str;

    /// The region over which the projection is defined. Inputs outside this
    /// sector are clamped to it.
    fn projection_limits(&self) -> Sector;

    /// Projects one geographic position.
    fn geographic_to_cartesian(
        &self,
        ellipsoid: &Ellipsoid,
        latitude: f64,
        longitude: f64,
        height: f64,
    ) -> Vec3;

    /// Inverse of [`GeographicProjection::geographic_to_cartesian`].
    fn cartesian_to_geographic(&self, ellipsoid: &Ellipsoid, point: Vec3) -> Position;

    /// Projects a `num_lat` x `num_lon` grid of points evenly spaced over
    /// `sector`, appending them row-major from the south-west corner to `out`.
    ///
    /// When `heights` is given it must hold `num_lat * num_lon` samples in the
    /// same order; each is multiplied by `vertical_exaggeration`. The last row
    /// and column land exactly on the sector's maximum latitude and longitude.
    fn geographic_to_cartesian_grid(
        &self,
        ellipsoid: &Ellipsoid,
        sector: &Sector,
        num_lat: usize,
        num_lon: usize,
        heights: Option<&[f32]>,
        vertical_exaggeration: f64,
        out: &mut Vec<Vec3>,
    );

    /// Projects the perimeter of the grid described by `sector`, `num_lat` and
    /// `num_lon` at a constant `height`, appending to `out`.
    ///
    /// Order: the south row west to east, the north row west to east, then
    /// the west and east columns south to north excluding the corners already
    /// emitted. A grid with a single row or column degenerates to that line.
    fn geographic_to_cartesian_border(
        &self,
        ellipsoid: &Ellipsoid,
        sector: &Sector,
        num_lat: usize,
        num_lon: usize,
        height: f64,
        out: &mut Vec<Vec3>,
    ) {
        if num_lat == 0 || num_lon == 0 {
            return;
        }

        let lats = grid_coordinates(sector.min_latitude(), sector.max_latitude(), num_lat);
        let lons = grid_coordinates(sector.min_longitude(), sector.max_longitude(), num_lon);

        let south = lats[0];
        let north = lats[num_lat - 1];
        for &lon in &lons {
            out.push(self.geographic_to_cartesian(ellipsoid, south, lon, height));
        }
        if num_lat > 1 {
            for &lon in &lons {
                out.push(self.geographic_to_cartesian(ellipsoid, north, lon, height));
            }
        }

        let west = lons[0];
        let east = lons[num_lon - 1];
        for &lat in lats.iter().skip(1).take(num_lat.saturating_sub(2)) {
            out.push(self.geographic_to_cartesian(ellipsoid, lat, west, height));
            if num_lon > 1 {
                out.push(self.geographic_to_cartesian(ellipsoid, lat, east, height));
            }
        }
    }
}

/// Evenly spaced coordinates from `min` to `max` with the final value forced
/// to `max` to keep adjacent grids crack-free.
pub(crate) fn grid_coordinates(min: f64, max: f64, count: usize) -> Vec<f64> {
    let delta = (max - min) / if count > 1 { (count - 1) as f64 } else { 1.0 };
    let mut coords = Vec::with_capacity(count);
    let mut value = min;
    for index in 0..count {
        coords.push(if index + 1 == count && count > 1 {
            max
        } else {
            value
        });
        value += delta;
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_coordinates_ends_exactly_on_max() {
        let coords = grid_coordinates(0.1, 0.7, 7);
        assert_eq!(coords.len(), 7);
        assert_eq!(coords[0], 0.1);
        assert_eq!(coords[6], 0.7);
    }

    #[test]
    fn test_grid_coordinates_single_sample() {
        assert_eq!(grid_coordinates(5.0, 10.0, 1), vec![5.0]);
    }

    #[test]
    fn test_border_point_count() {
        let projection = EquirectangularProjection::new();
        let ellipsoid = Ellipsoid::wgs84();
        let sector = Sector::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let mut out = Vec::new();
        projection.geographic_to_cartesian_border(&ellipsoid, &sector, 4, 5, 0.0, &mut out);
        // 2 full rows of 5 plus 2 interior rows of 2.
        assert_eq!(out.len(), 5 * 2 + 2 * 2);
    }

    #[test]
    fn test_border_single_row() {
        let projection = EquirectangularProjection::new();
        let ellipsoid = Ellipsoid::wgs84();
        let sector = Sector::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let mut out = Vec::new();
        projection.geographic_to_cartesian_border(&ellipsoid, &sector, 1, 3, 0.0, &mut out);
        assert_eq!(out.len(), 3);
    }
}
