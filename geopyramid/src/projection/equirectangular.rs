//! Equirectangular (plate carrée) projection.

use super::{grid_coordinates, Ellipsoid, GeographicProjection, Vec3};
use crate::geo::{clamp, Position, Sector};

/// Geographic projection mapping degrees linearly to meters on the equator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquirectangularProjection;

impl EquirectangularProjection {
    pub fn new() -> Self {
        Self
    }
}

impl GeographicProjection for EquirectangularProjection {
    fn name(&self) -> &str {
        "Equirectangular"
    }

    fn projection_limits(&self) -> Sector {
        Sector::full_sphere()
    }

    fn geographic_to_cartesian(
        &self,
        ellipsoid: &Ellipsoid,
        latitude: f64,
        longitude: f64,
        height: f64,
    ) -> Vec3 {
        let radius = ellipsoid.semi_major_axis();
        Vec3::new(
            radius * clamp(longitude, -180.0, 180.0).to_radians(),
            radius * clamp(latitude, -90.0, 90.0).to_radians(),
            height,
        )
    }

    fn cartesian_to_geographic(&self, ellipsoid: &Ellipsoid, point: Vec3) -> Position {
        let radius = ellipsoid.semi_major_axis();
        Position::new(
            (point.y / radius).to_degrees(),
            (point.x / radius).to_degrees(),
            point.z,
        )
    }

    fn geographic_to_cartesian_grid(
        &self,
        ellipsoid: &Ellipsoid,
        sector: &Sector,
        num_lat: usize,
        num_lon: usize,
        heights: Option<&[f32]>,
        vertical_exaggeration: f64,
        out: &mut Vec<Vec3>,
    ) {
        debug_assert!(num_lat > 0 && num_lon > 0, "grid dimensions must be positive");

        let radius = ellipsoid.semi_major_axis();
        let lons = grid_coordinates(sector.min_longitude(), sector.max_longitude(), num_lon);

        out.reserve(num_lat * num_lon);
        let mut index = 0;
        for lat in grid_coordinates(sector.min_latitude(), sector.max_latitude(), num_lat) {
            let y = radius * clamp(lat, -90.0, 90.0).to_radians();
            for &lon in &lons {
                let x = radius * clamp(lon, -180.0, 180.0).to_radians();
                let z = heights
                    .map(|h| h[index] as f64 * vertical_exaggeration)
                    .unwrap_or(0.0);
                out.push(Vec3::new(x, y, z));
                index += 1;
            }
        }
    }
}
