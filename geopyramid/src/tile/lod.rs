//! Level-of-detail test and the bounds it depends on.
//!
//! The test is local to each tile. Neighbouring tiles may end up more than
//! one level apart; nothing here enforces consistency between them.

use crate::coverage::ElevationModel;
use crate::geo::clamp;
use crate::render::RenderContext;

use super::{BoundingBox, BoundsKey, Tile};

impl Tile {
    /// Height limits of this tile's sector, refreshed when the elevation
    /// model's timestamp or the vertical exaggeration changed.
    pub fn height_limits(&self, rc: &RenderContext, elevation: &dyn ElevationModel) -> (f32, f32) {
        self.refresh_bounds(rc, elevation);
        self.bounds.borrow().height_limits()
    }

    /// Cartesian bounding box, cached like [`Tile::height_limits`].
    pub fn bounding_box(&self, rc: &RenderContext, elevation: &dyn ElevationModel) -> BoundingBox {
        self.refresh_bounds(rc, elevation);
        self.bounds.borrow().bounding_box()
    }

    fn refresh_bounds(&self, rc: &RenderContext, elevation: &dyn ElevationModel) {
        let key = BoundsKey {
            elevation_timestamp: elevation.timestamp(),
            vertical_exaggeration: rc.vertical_exaggeration(),
        };
        let mut bounds = self.bounds.borrow_mut();
        if bounds.is_valid_for(&key) {
            return;
        }
        let limits = elevation.height_limits(&self.sector);
        bounds.update(key, rc.globe(), &self.sector, limits);
    }

    /// Distance from the camera to the nearest point of this tile at its
    /// minimum height. Also remembered as [`Tile::distance`].
    pub fn distance_to_camera(&self, rc: &RenderContext, elevation: &dyn ElevationModel) -> f64 {
        let camera = rc.camera().position;
        let sector = &self.sector;

        let lat = clamp(camera.latitude, sector.min_latitude(), sector.max_latitude());
        // Across the antimeridian the nearest edge is the opposite one.
        let lon_diff = camera.longitude - sector.centroid_longitude();
        let lon = if lon_diff < -180.0 {
            sector.max_longitude()
        } else if lon_diff > 180.0 {
            sector.min_longitude()
        } else {
            clamp(camera.longitude, sector.min_longitude(), sector.max_longitude())
        };

        let (min_height, _) = self.height_limits(rc, elevation);
        let height = min_height as f64 * rc.vertical_exaggeration();
        let nearest = rc.globe().geographic_to_cartesian(lat, lon, height);

        let distance = nearest.distance_to(&rc.camera_point());
        self.distance.set(distance);
        distance
    }

    /// True when one texel of this tile covers more than `detail_factor`
    /// screen pixels at the tile's distance from the camera.
    pub fn must_subdivide(
        &self,
        rc: &RenderContext,
        elevation: &dyn ElevationModel,
        detail_factor: f64,
    ) -> bool {
        let distance = self.distance_to_camera(rc, elevation);
        let texel_size = self.texel_size_factor * rc.globe().equatorial_radius();
        let pixel_size = rc.pixel_size_at_distance(distance);
        texel_size > pixel_size * detail_factor * rc.density_factor()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use crate::coverage::{ElevationModel, FlatElevationModel};
    use crate::geo::{Location, Position, Sector};
    use crate::level::LevelSet;
    use crate::projection::Globe;
    use crate::render::{Camera, RenderContext, Viewport};
    use crate::tile::{level_zero_tiles, DefaultTileFactory, Tile};
    use crate::timestamp::Timestamp;

    /// Counts queries and reports fixed limits.
    struct CountingModel {
        timestamp: Cell<Timestamp>,
        limits: (f32, f32),
        queries: Cell<usize>,
    }

    impl ElevationModel for CountingModel {
        fn timestamp(&self) -> Timestamp {
            self.timestamp.get()
        }

        fn height_limits(&self, _sector: &Sector) -> (f32, f32) {
            self.queries.set(self.queries.get() + 1);
            self.limits
        }
    }

    fn rc_at(lat: f64, lon: f64, alt: f64) -> RenderContext {
        RenderContext::new(
            Globe::wgs84_mercator(),
            Camera::new(Position::new(lat, lon, alt)),
            Viewport::new(1024, 768),
        )
    }

    fn tile_at(sector: Sector) -> Tile {
        let delta = Location::new(sector.delta_latitude(), sector.delta_longitude());
        let set = Arc::new(LevelSet::new(sector, delta, 3, 256, 256).unwrap());
        level_zero_tiles(&set, &DefaultTileFactory).remove(0)
    }

    #[test]
    fn test_distance_directly_above() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        let rc = rc_at(5.0, 5.0, 1000.0);
        let distance = tile.distance_to_camera(&rc, &FlatElevationModel);
        assert!((distance - 1000.0).abs() < 1e-6);
        assert_eq!(tile.distance(), distance);
    }

    #[test]
    fn test_distance_uses_minimum_height() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        let rc = rc_at(5.0, 5.0, 1000.0).with_vertical_exaggeration(2.0);
        let model = CountingModel {
            timestamp: Cell::new(Timestamp::next()),
            limits: (100.0, 300.0),
            queries: Cell::new(0),
        };
        let distance = tile.distance_to_camera(&rc, &model);
        assert!((distance - 800.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_wraps_antimeridian() {
        let tile = tile_at(Sector::new(0.0, 10.0, 170.0, 180.0).unwrap());
        let rc = rc_at(5.0, -179.0, 0.0);
        let globe = rc.globe().clone();
        let distance = tile.distance_to_camera(&rc, &FlatElevationModel);
        // Nearest point is the eastern edge, not the western one.
        let edge = globe.geographic_to_cartesian(5.0, 180.0, 0.0);
        assert!((distance - edge.distance_to(&rc.camera_point())).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_cached_until_timestamp_changes() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        let rc = rc_at(5.0, 5.0, 1000.0);
        let model = CountingModel {
            timestamp: Cell::new(Timestamp::next()),
            limits: (0.0, 50.0),
            queries: Cell::new(0),
        };

        tile.bounding_box(&rc, &model);
        tile.bounding_box(&rc, &model);
        tile.height_limits(&rc, &model);
        assert_eq!(model.queries.get(), 1);

        model.timestamp.set(Timestamp::next());
        tile.bounding_box(&rc, &model);
        assert_eq!(model.queries.get(), 2);

        let rc = rc.with_vertical_exaggeration(3.0);
        let bbox = tile.bounding_box(&rc, &model);
        assert_eq!(model.queries.get(), 3);
        assert_eq!(bbox.max().z, 150.0);
    }

    #[test]
    fn test_inverted_limits_reset_to_zero() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        let rc = rc_at(5.0, 5.0, 1000.0);
        let model = CountingModel {
            timestamp: Cell::new(Timestamp::next()),
            limits: (f32::MAX, -f32::MAX),
            queries: Cell::new(0),
        };
        assert_eq!(tile.height_limits(&rc, &model), (0.0, 0.0));
    }

    #[test]
    fn test_must_subdivide_near_not_far() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        let near = rc_at(5.0, 5.0, 1_000.0);
        let far = rc_at(5.0, 5.0, 50_000_000.0);
        assert!(tile.must_subdivide(&near, &FlatElevationModel, 4.0));
        assert!(!tile.must_subdivide(&far, &FlatElevationModel, 4.0));
    }

    #[test]
    fn test_high_density_raises_threshold() {
        let tile = tile_at(Sector::new(0.0, 10.0, 0.0, 10.0).unwrap());
        // Pick an altitude where the standard threshold subdivides but the
        // doubled one does not.
        let texel = tile.texel_size_factor() * Globe::wgs84_mercator().equatorial_radius();
        let reference = rc_at(5.0, 5.0, 1.0);
        let per_meter = reference.pixel_size_at_distance(1.0);
        let altitude = texel / (per_meter * 1.5);
        let standard = rc_at(5.0, 5.0, altitude);
        let dense = rc_at(5.0, 5.0, altitude).with_dpi(400.0);
        assert!(tile.must_subdivide(&standard, &FlatElevationModel, 1.0));
        assert!(!tile.must_subdivide(&dense, &FlatElevationModel, 1.0));
    }
}
