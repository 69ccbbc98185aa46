//! Tile construction.

use std::sync::Arc;

use crate::geo::Sector;
use crate::level::{Level, LevelSet};

use super::Tile;

/// Builds tiles while level sets are walked and tiles subdivided.
///
/// Layers that need to attach their own per-tile state wrap or replace the
/// default factory; everything that creates tiles goes through one.
pub trait TileFactory {
    fn create_tile(
        &self,
        sector: Sector,
        level_set: &Arc<LevelSet>,
        level: &Level,
        row: u32,
        column: u32,
    ) -> Tile;
}

/// Builds plain [`Tile`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTileFactory;

impl TileFactory for DefaultTileFactory {
    fn create_tile(
        &self,
        sector: Sector,
        level_set: &Arc<LevelSet>,
        level: &Level,
        row: u32,
        column: u32,
    ) -> Tile {
        Tile::new(sector, Arc::clone(level_set), level, row, column)
    }
}
