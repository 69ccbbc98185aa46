//! Tile matrices: explicit per-level grids as published by coverage services.
//!
//! Unlike a [`LevelSet`], whose rows count north from a south-west origin, a
//! tile matrix counts rows south from its north-west corner. [`TileMatrix::flip_row`]
//! converts between the two numberings.

use crate::error::AddressingError;
use crate::geo::{Location, Sector};

use super::LevelSet;

/// One level of a [`TileMatrixSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
    ordinal: usize,
    sector: Sector,
    matrix_width: u32,
    matrix_height: u32,
    tile_width: u32,
    tile_height: u32,
}

impl TileMatrix {
    /// Create a tile matrix covering `sector` with a grid of
    /// `matrix_width` x `matrix_height` tiles.
    pub fn new(
        ordinal: usize,
        sector: Sector,
        matrix_width: u32,
        matrix_height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, AddressingError> {
        if matrix_width == 0 || matrix_height == 0 {
            return Err(AddressingError::InvalidMatrixDimensions {
                width: matrix_width,
                height: matrix_height,
            });
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(AddressingError::InvalidTileDimensions {
                width: tile_width,
                height: tile_height,
            });
        }
        Ok(Self {
            ordinal,
            sector,
            matrix_width,
            matrix_height,
            tile_width,
            tile_height,
        })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn matrix_width(&self) -> u32 {
        self.matrix_width
    }

    pub fn matrix_height(&self) -> u32 {
        self.matrix_height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Latitudinal degrees covered by one pixel of this matrix.
    pub fn degrees_per_pixel(&self) -> f64 {
        self.sector.delta_latitude() / (self.matrix_height as f64 * self.tile_height as f64)
    }

    /// Convert a row between north-origin and south-origin numbering.
    ///
    /// The conversion is its own inverse. Rows outside the matrix saturate to 0.
    pub fn flip_row(&self, row: u32) -> u32 {
        (self.matrix_height - 1).saturating_sub(row)
    }

    /// Geographic extent of the tile at `row` (counted from the north) and `col`.
    ///
    /// The last row and column snap to the matrix sector's edges exactly.
    pub fn tile_sector(&self, row: u32, col: u32) -> Result<Sector, AddressingError> {
        if row >= self.matrix_height || col >= self.matrix_width {
            return Err(AddressingError::TileOutOfRange {
                ordinal: self.ordinal,
                row,
                col,
                width: self.matrix_width,
                height: self.matrix_height,
            });
        }

        let delta_lat = self.sector.delta_latitude() / self.matrix_height as f64;
        let delta_lon = self.sector.delta_longitude() / self.matrix_width as f64;

        let max_lat = self.sector.max_latitude() - delta_lat * row as f64;
        let min_lat = if row == self.matrix_height - 1 {
            self.sector.min_latitude()
        } else {
            max_lat - delta_lat
        };
        let min_lon = self.sector.min_longitude() + delta_lon * col as f64;
        let max_lon = if col == self.matrix_width - 1 {
            self.sector.max_longitude()
        } else {
            min_lon + delta_lon
        };

        Ok(Sector::from_bounds(min_lat, max_lat, min_lon, max_lon))
    }
}

/// An ordered pyramid of tile matrices over one sector, coarsest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrixSet {
    sector: Sector,
    entries: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Build a pyramid whose first matrix is `matrix_width` x `matrix_height`
    /// tiles and whose every following matrix doubles both dimensions.
    ///
    /// # Errors
    ///
    /// Fails on an empty sector, zero level count or zero dimensions.
    pub fn from_tile_pyramid(
        sector: Sector,
        matrix_width: u32,
        matrix_height: u32,
        tile_width: u32,
        tile_height: u32,
        level_count: usize,
    ) -> Result<Self, AddressingError> {
        if sector.is_empty() {
            return Err(AddressingError::InvalidSector {
                min_lat: sector.min_latitude(),
                max_lat: sector.max_latitude(),
                min_lon: sector.min_longitude(),
                max_lon: sector.max_longitude(),
                reason: "tile matrix set sector is empty".to_string(),
            });
        }
        if level_count == 0 {
            return Err(AddressingError::NoLevels);
        }

        let mut entries = Vec::with_capacity(level_count);
        let (mut width, mut height) = (matrix_width, matrix_height);
        for ordinal in 0..level_count {
            entries.push(TileMatrix::new(
                ordinal,
                sector,
                width,
                height,
                tile_width,
                tile_height,
            )?);
            width = width.saturating_mul(2);
            height = height.saturating_mul(2);
        }

        Ok(Self { sector, entries })
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn matrix_count(&self) -> usize {
        self.entries.len()
    }

    pub fn matrix(&self, ordinal: usize) -> Option<&TileMatrix> {
        self.entries.get(ordinal)
    }

    pub fn matrices(&self) -> &[TileMatrix] {
        &self.entries
    }

    /// Index of the matrix whose resolution is closest to `degrees_per_pixel`.
    pub fn index_of_matrix_nearest(&self, degrees_per_pixel: f64) -> usize {
        let mut nearest = 0;
        let mut min_delta = f64::INFINITY;
        for (index, matrix) in self.entries.iter().enumerate() {
            let delta = (matrix.degrees_per_pixel() - degrees_per_pixel).abs();
            if delta < min_delta {
                min_delta = delta;
                nearest = index;
            }
        }
        nearest
    }

    /// Equivalent [`LevelSet`]: one level per matrix, origin at the south-west
    /// corner of the set's sector.
    pub fn to_level_set(&self) -> Result<LevelSet, AddressingError> {
        let first = self.entries.first().ok_or(AddressingError::NoLevels)?;
        let delta = Location::new(
            self.sector.delta_latitude() / first.matrix_height as f64,
            self.sector.delta_longitude() / first.matrix_width as f64,
        );
        LevelSet::new(
            self.sector,
            delta,
            self.entries.len(),
            first.tile_width,
            first.tile_height,
        )
    }
}
