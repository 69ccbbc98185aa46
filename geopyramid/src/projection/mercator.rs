//! Ellipsoidal Mercator projection.
//!
//! Forward formulas follow the standard conformal Mercator on the ellipsoid.
//! The inverse has no closed form; it is evaluated with the conformal
//! latitude series truncated at the eighth power of eccentricity.

use std::f64::consts::FRAC_PI_2;

use super::{grid_coordinates, Ellipsoid, GeographicProjection, Vec3};
use crate::geo::{clamp, Position, Sector};

/// Latitude limit in degrees. Mercator diverges at the poles.
pub const MERCATOR_MAX_LATITUDE: f64 = 78.0;

/// Ellipsoidal Mercator projection clamped to ±78° latitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct MercatorProjection;

impl MercatorProjection {
    pub fn new() -> Self {
        Self
    }

    /// The latitude-dependent northing for one latitude in degrees.
    ///
    /// `y = 0.5·R·ln(((1+sinφ)/(1-sinφ)) · ((1-e·sinφ)/(1+e·sinφ))^e)`
    fn northing(ellipsoid: &Ellipsoid, latitude: f64) -> f64 {
        let ecc = ellipsoid.eccentricity_squared().sqrt();
        let sin_phi = latitude.to_radians().sin();
        let s = ((1.0 + sin_phi) / (1.0 - sin_phi))
            * ((1.0 - ecc * sin_phi) / (1.0 + ecc * sin_phi)).powf(ecc);
        0.5 * ellipsoid.semi_major_axis() * s.ln()
    }

    fn clamp_latitude(latitude: f64) -> f64 {
        clamp(latitude, -MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE)
    }

    fn clamp_longitude(longitude: f64) -> f64 {
        clamp(longitude, -180.0, 180.0)
    }
}

impl GeographicProjection for MercatorProjection {
    fn name(&self) -> &str {
        "Mercator"
    }

    fn projection_limits(&self) -> Sector {
        Sector::from_degrees(
            -MERCATOR_MAX_LATITUDE,
            -180.0,
            2.0 * MERCATOR_MAX_LATITUDE,
            360.0,
        )
    }

    fn geographic_to_cartesian(
        &self,
        ellipsoid: &Ellipsoid,
        latitude: f64,
        longitude: f64,
        height: f64,
    ) -> Vec3 {
        let latitude = Self::clamp_latitude(latitude);
        let longitude = Self::clamp_longitude(longitude);

        Vec3::new(
            ellipsoid.semi_major_axis() * longitude.to_radians(),
            Self::northing(ellipsoid, latitude),
            height,
        )
    }

    fn cartesian_to_geographic(&self, ellipsoid: &Ellipsoid, point: Vec3) -> Position {
        let radius = ellipsoid.semi_major_axis();
        let e2 = ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let e8 = e6 * e2;

        // Conformal latitude of the northing.
        let t = (-point.y / radius).exp();
        let a = FRAC_PI_2 - 2.0 * t.atan();

        // Coefficients of sin(2A), sin(4A), sin(6A), sin(8A).
        let b = e2 / 2.0 + 5.0 * e4 / 24.0 + e6 / 12.0 + 13.0 * e8 / 360.0;
        let c = 7.0 * e4 / 48.0 + 29.0 * e6 / 240.0 + 811.0 * e8 / 11520.0;
        let d = 7.0 * e6 / 120.0 + 81.0 * e8 / 1120.0;
        let e = 4279.0 * e8 / 161_280.0;

        // The multiple-angle sines rewritten as sin(2A) times a cubic in
        // cos(2A), so the series needs one sin and one cos.
        let b_prime = b - d;
        let c_prime = 2.0 * c - 4.0 * e;
        let d_prime = 4.0 * d;
        let e_prime = 8.0 * e;

        let sin_2a = (2.0 * a).sin();
        let cos_2a = (2.0 * a).cos();
        let latitude =
            a + sin_2a * (b_prime + cos_2a * (c_prime + cos_2a * (d_prime + e_prime * cos_2a)));

        Position::new(
            latitude.to_degrees(),
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
        if let Some(heights) = heights {
            debug_assert!(heights.len() >= num_lat * num_lon, "height grid too small");
        }

        let radius = ellipsoid.semi_major_axis();
        let lats = grid_coordinates(sector.min_latitude(), sector.max_latitude(), num_lat);
        let xs: Vec<f64> = grid_coordinates(sector.min_longitude(), sector.max_longitude(), num_lon)
            .into_iter()
            .map(|lon| radius * Self::clamp_longitude(lon).to_radians())
            .collect();

        out.reserve(num_lat * num_lon);
        let mut index = 0;
        for lat in lats {
            let y = Self::northing(ellipsoid, Self::clamp_latitude(lat));
            for &x in &xs {
                let z = heights
                    .map(|h| h[index] as f64 * vertical_exaggeration)
                    .unwrap_or(0.0);
                out.push(Vec3::new(x, y, z));
                index += 1;
            }
        }
    }
}
