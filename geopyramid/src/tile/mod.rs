//! Tiles: addressable cells of a level set.
//!
//! A [`Tile`] is identified by `(level, row, column)` within its
//! [`LevelSet`]. Tiles are cheap to build and are recreated whenever a level
//! is walked; the only state they carry beyond their address is lazily
//! computed geometry:
//!
//! - a bounding box and height limits, cached against the elevation model's
//!   timestamp and the vertical exaggeration ([`TileBoundsCache`])
//! - the last computed distance to the camera
//!
//! Both use interior mutability and make tiles `!Sync`. The level-of-detail
//! pass runs on the render loop only.
//!
//! Subdivision produces four children at the next finer level. Repeated
//! subdivision of the same tile across frames is served from a
//! [`SubdivisionCache`].

mod addressing;
mod bounds;
mod factory;
mod lod;

pub use addressing::{
    assemble_tiles_for_level, compute_column, compute_last_column, compute_last_row,
    compute_row, level_zero_tiles,
};
pub use bounds::{BoundingBox, BoundsKey, TileBoundsCache};
pub use factory::{DefaultTileFactory, TileFactory};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::ReuseCache;
use crate::geo::Sector;
use crate::level::{Level, LevelSet};

/// Reuse cache holding the four children of previously subdivided tiles.
pub type SubdivisionCache = ReuseCache<TileKey, Rc<[Tile; 4]>>;

/// Composite tile identity, formatted as `"{level}.{row}.{column}"`.
///
/// Unique within one level set only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: usize,
    pub row: u32,
    pub column: u32,
}

impl TileKey {
    pub fn new(level: usize, row: u32, column: u32) -> Self {
        Self { level, row, column }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.level, self.row, self.column)
    }
}

/// A string that is not a `level.row.column` triple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid tile key '{0}'")]
pub struct ParseTileKeyError(String);

impl FromStr for TileKey {
    type Err = ParseTileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTileKeyError(s.to_string());
        let mut parts = s.split('.');
        let level = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let row = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let column = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self { level, row, column })
    }
}

/// One cell of a level set.
#[derive(Debug, Clone)]
pub struct Tile {
    sector: Sector,
    level: Level,
    key: TileKey,
    level_set: Arc<LevelSet>,
    texel_size_factor: f64,
    bounds: RefCell<TileBoundsCache>,
    distance: Cell<f64>,
}

impl Tile {
    /// Create the tile at `row`, `column` of `level` covering `sector`.
    pub fn new(
        sector: Sector,
        level_set: Arc<LevelSet>,
        level: &Level,
        row: u32,
        column: u32,
    ) -> Self {
        // Texel footprint in radians of arc, shrinking with the convergence
        // of meridians away from the equator.
        let texel_size_factor = level.tile_delta().longitude.to_radians()
            / level.tile_width() as f64
            * sector.centroid_latitude().to_radians().cos();

        Self {
            sector,
            level: level.clone(),
            key: TileKey::new(level.index(), row, column),
            level_set,
            texel_size_factor,
            bounds: RefCell::new(TileBoundsCache::default()),
            distance: Cell::new(f64::INFINITY),
        }
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn level_set(&self) -> &Arc<LevelSet> {
        &self.level_set
    }

    pub fn row(&self) -> u32 {
        self.key.row
    }

    pub fn column(&self) -> u32 {
        self.key.column
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Angular size of one texel in radians, scaled by `cos(latitude)`.
    pub fn texel_size_factor(&self) -> f64 {
        self.texel_size_factor
    }

    /// Distance to the camera as of the last LOD test, infinite before one.
    pub fn distance(&self) -> f64 {
        self.distance.get()
    }

    /// Rough resident size, used to weigh cached subdivisions.
    pub fn size_in_bytes() -> usize {
        std::mem::size_of::<Tile>()
    }

    /// Split into south-west, south-east, north-west and north-east children
    /// at the next finer level.
    ///
    /// Returns `None` at the finest level, and when the child rows or
    /// columns would not fit a `u32`.
    pub fn subdivide(&self, factory: &dyn TileFactory) -> Option<[Tile; 4]> {
        let next = self.level_set.next_level(&self.level)?;

        let min_lat = self.sector.min_latitude();
        let mid_lat = self.sector.centroid_latitude();
        let max_lat = self.sector.max_latitude();
        let min_lon = self.sector.min_longitude();
        let mid_lon = self.sector.centroid_longitude();
        let max_lon = self.sector.max_longitude();

        let row = self.key.row.checked_mul(2)?;
        let col = self.key.column.checked_mul(2)?;
        let set = &self.level_set;

        Some([
            factory.create_tile(
                Sector::from_bounds(min_lat, mid_lat, min_lon, mid_lon),
                set,
                next,
                row,
                col,
            ),
            factory.create_tile(
                Sector::from_bounds(min_lat, mid_lat, mid_lon, max_lon),
                set,
                next,
                row,
                col + 1,
            ),
            factory.create_tile(
                Sector::from_bounds(mid_lat, max_lat, min_lon, mid_lon),
                set,
                next,
                row + 1,
                col,
            ),
            factory.create_tile(
                Sector::from_bounds(mid_lat, max_lat, mid_lon, max_lon),
                set,
                next,
                row + 1,
                col + 1,
            ),
        ])
    }

    /// Like [`Tile::subdivide`], memoized in `cache` under this tile's key.
    pub fn subdivide_to_cache(
        &self,
        factory: &dyn TileFactory,
        cache: &mut SubdivisionCache,
    ) -> Option<Rc<[Tile; 4]>> {
        if let Some(children) = cache.get(&self.key) {
            return Some(Rc::clone(children));
        }

        let children = Rc::new(self.subdivide(factory)?);
        cache.put(self.key, Rc::clone(&children), 4 * Self::size_in_bytes());
        Some(children)
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.sector == other.sector
    }
}
