//! Reference ellipsoid and the globe that pairs it with a projection.

use std::fmt;
use std::sync::Arc;

use super::{GeographicProjection, MercatorProjection, Vec3};
use crate::geo::{Position, Sector};

/// WGS84 semi-major axis in meters.
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// WGS84 inverse flattening.
pub const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// An oblate reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    semi_major_axis: f64,
    inverse_flattening: f64,
}

impl Ellipsoid {
    pub fn new(semi_major_axis: f64, inverse_flattening: f64) -> Self {
        Self {
            semi_major_axis,
            inverse_flattening,
        }
    }

    /// The WGS84 ellipsoid.
    pub fn wgs84() -> Self {
        Self::new(WGS84_SEMI_MAJOR_AXIS, WGS84_INVERSE_FLATTENING)
    }

    /// Equatorial radius in meters.
    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    /// Polar radius in meters.
    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_major_axis * (1.0 - 1.0 / self.inverse_flattening)
    }

    /// First eccentricity squared, `2f - f²`.
    pub fn eccentricity_squared(&self) -> f64 {
        let f = 1.0 / self.inverse_flattening;
        2.0 * f - f * f
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// A reference ellipsoid combined with the projection used to render it.
///
/// Cloning is cheap; the projection is shared.
#[derive(Clone)]
pub struct Globe {
    ellipsoid: Ellipsoid,
    projection: Arc<dyn GeographicProjection>,
}

impl Globe {
    pub fn new(ellipsoid: Ellipsoid, projection: Arc<dyn GeographicProjection>) -> Self {
        Self {
            ellipsoid,
            projection,
        }
    }

    /// WGS84 with the Mercator projection.
    pub fn wgs84_mercator() -> Self {
        Self::new(Ellipsoid::wgs84(), Arc::new(MercatorProjection::new()))
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn projection(&self) -> &dyn GeographicProjection {
        self.projection.as_ref()
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.ellipsoid.semi_major_axis()
    }

    pub fn polar_radius(&self) -> f64 {
        self.ellipsoid.semi_minor_axis()
    }

    pub fn eccentricity_squared(&self) -> f64 {
        self.ellipsoid.eccentricity_squared()
    }

    pub fn geographic_to_cartesian(&self, latitude: f64, longitude: f64, height: f64) -> Vec3 {
        self.projection
            .geographic_to_cartesian(&self.ellipsoid, latitude, longitude, height)
    }

    pub fn cartesian_to_geographic(&self, point: Vec3) -> Position {
        self.projection
            .cartesian_to_geographic(&self.ellipsoid, point)
    }

    pub fn geographic_to_cartesian_grid(
        &self,
        sector: &Sector,
        num_lat: usize,
        num_lon: usize,
        heights: Option<&[f32]>,
        vertical_exaggeration: f64,
        out: &mut Vec<Vec3>,
    ) {
        self.projection.geographic_to_cartesian_grid(
            &self.ellipsoid,
            sector,
            num_lat,
            num_lon,
            heights,
            vertical_exaggeration,
            out,
        );
    }

    pub fn geographic_to_cartesian_border(
        &self,
        sector: &Sector,
        num_lat: usize,
        num_lon: usize,
        height: f64,
        out: &mut Vec<Vec3>,
    ) {
        self.projection.geographic_to_cartesian_border(
            &self.ellipsoid,
            sector,
            num_lat,
            num_lon,
            height,
            out,
        );
    }
}

impl fmt::Debug for Globe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Globe")
            .field("ellipsoid", &self.ellipsoid)
            .field("projection", &self.projection.name())
            .finish()
    }
}
