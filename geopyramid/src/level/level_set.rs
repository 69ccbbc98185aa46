//! Levels and level sets.

use crate::error::AddressingError;
use crate::geo::{Location, Sector};

/// One resolution rung of a [`LevelSet`].
///
/// Index 0 is the coarsest level. Each successive level halves the angular
/// size of its tiles while keeping the tile pixel dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    index: usize,
    tile_delta: Location,
    tile_width: u32,
    tile_height: u32,
    next: Option<usize>,
}

impl Level {
    /// Position of this level in its set, 0 being the coarsest.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Angular size of one tile: `latitude` and `longitude` deltas in degrees.
    pub fn tile_delta(&self) -> Location {
        self.tile_delta
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Index of the next finer level, `None` at the finest level.
    pub fn next_index(&self) -> Option<usize> {
        self.next
    }

    pub fn is_first_level(&self) -> bool {
        self.index == 0
    }

    pub fn is_last_level(&self) -> bool {
        self.next.is_none()
    }

    /// Latitudinal size of one texel in degrees.
    pub fn texel_height(&self) -> f64 {
        self.tile_delta.latitude / self.tile_height as f64
    }
}

/// A pyramid of levels covering one sector.
///
/// Tiles are addressed by `(level, row, column)` with rows counted north from
/// the tile origin and columns east from it. The origin defaults to the
/// sector's south-west corner.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    sector: Sector,
    tile_origin: Location,
    levels: Vec<Level>,
}

impl LevelSet {
    /// Create a level set whose first level uses `first_level_delta` and whose
    /// every following level halves it.
    ///
    /// # Errors
    ///
    /// Fails when the sector is empty, the level count is zero, the delta is
    /// not strictly positive or the tile dimensions are zero.
    pub fn new(
        sector: Sector,
        first_level_delta: Location,
        level_count: usize,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, AddressingError> {
        if sector.is_empty() {
            return Err(AddressingError::InvalidSector {
                min_lat: sector.min_latitude(),
                max_lat: sector.max_latitude(),
                min_lon: sector.min_longitude(),
                max_lon: sector.max_longitude(),
                reason: "level set sector is empty".to_string(),
            });
        }
        if level_count == 0 {
            return Err(AddressingError::NoLevels);
        }
        let valid_delta = |d: f64| d.is_finite() && d > 0.0;
        if !valid_delta(first_level_delta.latitude) || !valid_delta(first_level_delta.longitude) {
            return Err(AddressingError::InvalidTileDelta {
                lat: first_level_delta.latitude,
                lon: first_level_delta.longitude,
            });
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(AddressingError::InvalidTileDimensions {
                width: tile_width,
                height: tile_height,
            });
        }

        let mut levels = Vec::with_capacity(level_count);
        let mut delta = first_level_delta;
        for index in 0..level_count {
            levels.push(Level {
                index,
                tile_delta: delta,
                tile_width,
                tile_height,
                next: (index + 1 < level_count).then_some(index + 1),
            });
            delta = Location::new(delta.latitude / 2.0, delta.longitude / 2.0);
        }

        Ok(Self {
            sector,
            tile_origin: Location::new(sector.min_latitude(), sector.min_longitude()),
            levels,
        })
    }

    /// Create a level set with as many levels as needed for the finest level
    /// to reach `resolution` degrees per texel.
    pub fn with_resolution(
        sector: Sector,
        first_level_delta: Location,
        resolution: f64,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, AddressingError> {
        if tile_height == 0 {
            return Err(AddressingError::InvalidTileDimensions {
                width: tile_width,
                height: tile_height,
            });
        }
        let first_texel = first_level_delta.latitude / tile_height as f64;
        let level_count = if resolution > 0.0 && first_texel > resolution {
            (first_texel / resolution).log2().ceil() as usize + 1
        } else {
            1
        };
        Self::new(sector, first_level_delta, level_count, tile_width, tile_height)
    }

    /// Override the grid origin rows and columns are counted from.
    pub fn with_tile_origin(mut self, origin: Location) -> Self {
        self.tile_origin = origin;
        self
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn tile_origin(&self) -> Location {
        self.tile_origin
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    /// The next finer level, `None` when `level` is the finest.
    pub fn next_level(&self, level: &Level) -> Option<&Level> {
        level.next.and_then(|index| self.levels.get(index))
    }

    pub fn levels(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }

    /// The coarsest level whose texels are no larger than `resolution`
    /// degrees, or the finest level when none is fine enough.
    pub fn level_for_resolution(&self, resolution: f64) -> &Level {
        self.levels
            .iter()
            .find(|level| level.texel_height() <= resolution)
            .unwrap_or_else(|| self.last_level())
    }
}
