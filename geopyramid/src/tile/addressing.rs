//! Grid addressing: geographic coordinates to rows and columns, and level
//! enumeration.
//!
//! Rows count north and columns count east from the level set's tile origin.
//! A coordinate on the far edge of the full extent (a 180° latitude span or a
//! 360° longitude span) belongs to the last row or column rather than to a
//! cell past the end of the grid.

use std::sync::Arc;

use crate::level::{Level, LevelSet};
use crate::geo::Sector;

use super::{Tile, TileFactory};

/// Row containing `latitude`.
pub fn compute_row(tile_delta: f64, latitude: f64, origin: f64) -> i32 {
    let offset = latitude - origin;
    let mut row = (offset / tile_delta).floor() as i32;
    if offset == 180.0 {
        row -= 1;
    }
    row
}

/// Column containing `longitude`.
pub fn compute_column(tile_delta: f64, longitude: f64, origin: f64) -> i32 {
    let offset = longitude - origin;
    let mut col = (offset / tile_delta).floor() as i32;
    if offset == 360.0 {
        col -= 1;
    }
    col
}

/// Last row touched by a sector whose maximum latitude is `latitude`.
///
/// A maximum lying on a row boundary belongs to the row below it.
pub fn compute_last_row(tile_delta: f64, latitude: f64, origin: f64) -> i32 {
    let offset = latitude - origin;
    if offset < tile_delta {
        return 0;
    }
    (offset / tile_delta - 1.0).ceil() as i32
}

/// Last column touched by a sector whose maximum longitude is `longitude`.
pub fn compute_last_column(tile_delta: f64, longitude: f64, origin: f64) -> i32 {
    let offset = longitude - origin;
    if offset < tile_delta {
        return 0;
    }
    (offset / tile_delta - 1.0).ceil() as i32
}

/// Every tile of `level` that touches the level set's sector, row-major from
/// the south-west.
///
/// Tile sectors are built by accumulating the tile delta from the first row
/// and column so neighbouring tiles share bit-identical edges. Rows and
/// columns before the tile origin are skipped.
pub fn assemble_tiles_for_level(
    level_set: &Arc<LevelSet>,
    level: &Level,
    factory: &dyn TileFactory,
) -> Vec<Tile> {
    let sector = level_set.sector();
    let origin = level_set.tile_origin();
    let delta = level.tile_delta();

    let first_row = compute_row(delta.latitude, sector.min_latitude(), origin.latitude).max(0);
    let last_row = compute_last_row(delta.latitude, sector.max_latitude(), origin.latitude);
    let first_col =
        compute_column(delta.longitude, sector.min_longitude(), origin.longitude).max(0);
    let last_col = compute_last_column(delta.longitude, sector.max_longitude(), origin.longitude);

    if last_row < first_row || last_col < first_col {
        return Vec::new();
    }

    let first_row_lat = origin.latitude + first_row as f64 * delta.latitude;
    let first_col_lon = origin.longitude + first_col as f64 * delta.longitude;

    let capacity = ((last_row - first_row + 1) * (last_col - first_col + 1)) as usize;
    let mut tiles = Vec::with_capacity(capacity);

    let mut lat = first_row_lat;
    for row in first_row..=last_row {
        let mut lon = first_col_lon;
        for col in first_col..=last_col {
            let tile_sector = Sector::from_degrees(lat, lon, delta.latitude, delta.longitude);
            tiles.push(factory.create_tile(tile_sector, level_set, level, row as u32, col as u32));
            lon += delta.longitude;
        }
        lat += delta.latitude;
    }

    tiles
}

/// The coarsest tiles of a level set.
pub fn level_zero_tiles(level_set: &Arc<LevelSet>, factory: &dyn TileFactory) -> Vec<Tile> {
    assemble_tiles_for_level(level_set, level_set.first_level(), factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use crate::tile::DefaultTileFactory;
    use proptest::prelude::*;

    #[test]
    fn test_compute_row_basic() {
        assert_eq!(compute_row(10.0, 25.0, 0.0), 2);
        assert_eq!(compute_row(10.0, 20.0, 0.0), 2);
        assert_eq!(compute_row(10.0, -5.0, -90.0), 8);
    }

    #[test]
    fn test_far_edge_pulled_back() {
        assert_eq!(compute_row(90.0, 90.0, -90.0), 1);
        assert_eq!(compute_column(90.0, 180.0, -180.0), 3);
        assert_eq!(compute_last_row(90.0, 90.0, -90.0), 1);
        assert_eq!(compute_last_column(90.0, 180.0, -180.0), 3);
    }

    #[test]
    fn test_last_row_in_first_cell() {
        assert_eq!(compute_last_row(20.0, 5.0, 0.0), 0);
        assert_eq!(compute_last_row(20.0, 0.0, 0.0), 0);
        assert_eq!(compute_last_column(20.0, 19.9, 0.0), 0);
    }

    #[test]
    fn test_last_row_on_boundary_belongs_below() {
        assert_eq!(compute_last_row(10.0, 30.0, 0.0), 2);
        assert_eq!(compute_last_row(10.0, 30.5, 0.0), 3);
    }

    #[test]
    fn test_single_tile_level() {
        let sector = Sector::new(-10.0, 10.0, -10.0, 10.0).unwrap();
        let set = Arc::new(LevelSet::new(sector, Location::new(20.0, 20.0), 1, 256, 256).unwrap());
        let tiles = level_zero_tiles(&set, &DefaultTileFactory);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].key().to_string(), "0.0.0");
        assert_eq!(*tiles[0].sector(), sector);
    }

    #[test]
    fn test_global_level_row_major() {
        let set = Arc::new(
            LevelSet::new(Sector::full_sphere(), Location::new(90.0, 90.0), 2, 256, 256).unwrap(),
        );
        let tiles = level_zero_tiles(&set, &DefaultTileFactory);
        assert_eq!(tiles.len(), 8);
        assert_eq!(tiles[0].key(), crate::tile::TileKey::new(0, 0, 0));
        assert_eq!(tiles[3].key(), crate::tile::TileKey::new(0, 0, 3));
        assert_eq!(tiles[4].key(), crate::tile::TileKey::new(0, 1, 0));
        assert_eq!(tiles[7].sector().max_latitude(), 90.0);
        assert_eq!(tiles[7].sector().max_longitude(), 180.0);

        let next = assemble_tiles_for_level(&set, set.level(1).unwrap(), &DefaultTileFactory);
        assert_eq!(next.len(), 32);
    }

    #[test]
    fn test_neighbours_share_edges() {
        let sector = Sector::new(-33.3, 47.1, 12.7, 59.9).unwrap();
        let set = Arc::new(LevelSet::new(sector, Location::new(7.3, 3.1), 1, 64, 64).unwrap());
        let tiles = level_zero_tiles(&set, &DefaultTileFactory);
        let cols = (compute_last_column(3.1, 59.9, 12.7) + 1) as usize;
        for pair in tiles.chunks(cols) {
            for w in pair.windows(2) {
                assert_eq!(w[0].sector().max_longitude(), w[1].sector().min_longitude());
            }
        }
        // The grid covers the sector.
        let union = tiles.iter().fold(Sector::empty(), |acc, t| acc.union(t.sector()));
        assert!(union.contains_sector(&sector));
    }

    proptest! {
        #[test]
        fn prop_last_row_contains_max_latitude(
            delta in 0.01f64..45.0,
            origin in -90.0f64..0.0,
            span in 0.0f64..90.0,
        ) {
            let max = origin + span;
            let last = compute_last_row(delta, max, origin);
            prop_assert!(last >= 0);

            // The tile at `last` contains the maximum, edges inclusive.
            let south = origin + last as f64 * delta;
            let north = south + delta;
            let tolerance = 1e-9 * (1.0 + span);
            prop_assert!(max >= south - tolerance && max <= north + tolerance);

            // Off a grid line the two computations name the same tile.
            let cells = span / delta;
            let on_grid_line = (cells - cells.round()).abs() < 1e-6;
            if !on_grid_line {
                prop_assert_eq!(compute_row(delta, max, origin), last);
            }
        }

        #[test]
        fn prop_last_column_contains_max_longitude(
            delta in 0.01f64..90.0,
            span in 0.0f64..360.0,
        ) {
            let origin = -180.0;
            let max = origin + span;
            let last = compute_last_column(delta, max, origin);
            let west = origin + last as f64 * delta;
            let tolerance = 1e-9 * (1.0 + span);
            prop_assert!(max >= west - tolerance && max <= west + delta + tolerance);

            let cells = span / delta;
            if (cells - cells.round()).abs() >= 1e-6 {
                prop_assert_eq!(compute_column(delta, max, origin), last);
            }
        }
    }
}
