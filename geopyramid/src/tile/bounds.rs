//! Cartesian bounding geometry for tiles.

use crate::geo::Sector;
use crate::projection::{Globe, Vec3};
use crate::render::Frustum;
use crate::timestamp::Timestamp;

/// Axis-aligned box in Cartesian coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(&max),
            max: min.max(&max),
        }
    }

    /// Box around the projection of a 3 x 3 grid of `sector` points at both
    /// `min_height` and `max_height` (meters, exaggeration already applied).
    pub fn from_sector(globe: &Globe, sector: &Sector, min_height: f64, max_height: f64) -> Self {
        let mut bbox = Self::default();
        bbox.set_to_sector(globe, sector, min_height, max_height);
        bbox
    }

    /// Recompute in place. See [`BoundingBox::from_sector`].
    pub fn set_to_sector(
        &mut self,
        globe: &Globe,
        sector: &Sector,
        min_height: f64,
        max_height: f64,
    ) {
        let mut points = Vec::with_capacity(18);
        let low = [min_height as f32; 9];
        let high = [max_height as f32; 9];
        globe.geographic_to_cartesian_grid(sector, 3, 3, Some(&low), 1.0, &mut points);
        globe.geographic_to_cartesian_grid(sector, 3, 3, Some(&high), 1.0, &mut points);

        let Some(first) = points.first().copied() else {
            return;
        };
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        self.min = min;
        self.max = max;
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Euclidean distance from `point` to the nearest point of the box, zero
    /// inside it.
    pub fn distance_to(&self, point: &Vec3) -> f64 {
        let dx = (self.min.x - point.x).max(0.0).max(point.x - self.max.x);
        let dy = (self.min.y - point.y).max(0.0).max(point.y - self.max.y);
        let dz = (self.min.z - point.z).max(0.0).max(point.z - self.max.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// False only when the box lies entirely outside one of the frustum planes.
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        frustum.planes().iter().all(|plane| {
            // Corner furthest along the plane normal.
            let n = plane.normal();
            let corner = Vec3::new(
                if n.x >= 0.0 { self.max.x } else { self.min.x },
                if n.y >= 0.0 { self.max.y } else { self.min.y },
                if n.z >= 0.0 { self.max.z } else { self.min.z },
            );
            plane.distance_to(&corner) >= 0.0
        })
    }
}

/// Inputs a tile's cached bounds were computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsKey {
    pub elevation_timestamp: Timestamp,
    pub vertical_exaggeration: f64,
}

/// Height limits and bounding box of one tile, valid for one [`BoundsKey`].
#[derive(Debug, Clone, Default)]
pub struct TileBoundsCache {
    key: Option<BoundsKey>,
    height_limits: (f32, f32),
    bounding_box: BoundingBox,
}

impl TileBoundsCache {
    pub fn is_valid_for(&self, key: &BoundsKey) -> bool {
        self.key.as_ref() == Some(key)
    }

    /// Store freshly computed bounds. An inverted height range, the elevation
    /// model's way of reporting no data, is stored as `(0, 0)`.
    pub fn update(
        &mut self,
        key: BoundsKey,
        globe: &Globe,
        sector: &Sector,
        height_limits: (f32, f32),
    ) {
        let (min, max) = if height_limits.0 > height_limits.1 {
            (0.0, 0.0)
        } else {
            height_limits
        };
        let exaggeration = key.vertical_exaggeration;
        self.bounding_box.set_to_sector(
            globe,
            sector,
            min as f64 * exaggeration,
            max as f64 * exaggeration,
        );
        self.height_limits = (min, max);
        self.key = Some(key);
    }

    pub fn height_limits(&self) -> (f32, f32) {
        self.height_limits
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::EquirectangularProjection;
    use std::sync::Arc;

    fn plate_carree() -> Globe {
        Globe::new(
            crate::projection::Ellipsoid::wgs84(),
            Arc::new(EquirectangularProjection::new()),
        )
    }

    #[test]
    fn test_box_spans_heights() {
        let globe = plate_carree();
        let sector = Sector::new(0.0, 10.0, 0.0, 20.0).unwrap();
        let bbox = BoundingBox::from_sector(&globe, &sector, -100.0, 500.0);
        let r = globe.equatorial_radius();
        assert!((bbox.min().x).abs() < 1e-6);
        assert!((bbox.max().x - r * 20f64.to_radians()).abs() < 1e-6);
        assert!((bbox.max().y - r * 10f64.to_radians()).abs() < 1e-6);
        assert_eq!(bbox.min().z, -100.0);
        assert_eq!(bbox.max().z, 500.0);
    }

    #[test]
    fn test_distance_to() {
        let bbox = BoundingBox::new(Vec3::ZERO, Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(bbox.distance_to(&Vec3::new(5.0, 5.0, 5.0)), 0.0);
        assert_eq!(bbox.distance_to(&Vec3::new(5.0, 5.0, 13.0)), 3.0);
        assert_eq!(bbox.distance_to(&Vec3::new(13.0, 14.0, 5.0)), 5.0);
    }

    #[test]
    fn test_intersects_frustum() {
        let frustum = Frustum::from_box(Vec3::ZERO, Vec3::new(10.0, 10.0, 10.0));
        let inside = BoundingBox::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 2.0, 2.0));
        let straddling = BoundingBox::new(Vec3::new(-5.0, 1.0, 1.0), Vec3::new(1.0, 2.0, 2.0));
        let outside = BoundingBox::new(Vec3::new(11.0, 1.0, 1.0), Vec3::new(12.0, 2.0, 2.0));
        assert!(inside.intersects_frustum(&frustum));
        assert!(straddling.intersects_frustum(&frustum));
        assert!(!outside.intersects_frustum(&frustum));
    }

    #[test]
    fn test_cache_key_and_no_data_reset() {
        let globe = plate_carree();
        let sector = Sector::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let key = BoundsKey {
            elevation_timestamp: Timestamp::ZERO,
            vertical_exaggeration: 2.0,
        };
        let mut cache = TileBoundsCache::default();
        assert!(!cache.is_valid_for(&key));

        cache.update(key, &globe, &sector, (10.0, 20.0));
        assert!(cache.is_valid_for(&key));
        assert_eq!(cache.height_limits(), (10.0, 20.0));
        assert_eq!(cache.bounding_box().max().z, 40.0);

        let changed = BoundsKey {
            vertical_exaggeration: 1.0,
            ..key
        };
        assert!(!cache.is_valid_for(&changed));

        cache.update(changed, &globe, &sector, (5.0, -5.0));
        assert_eq!(cache.height_limits(), (0.0, 0.0));
        assert_eq!(cache.bounding_box().max().z, 0.0);
    }
}
