//! Tiled elevation coverage.
//!
//! Heights come from [`ElevationRaster`]s committed by the retrieval
//! pipeline. The coverage is its own elevation model while it selects tiles,
//! so tile bounds follow the terrain as it streams in.

use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::error;

use super::model::NO_DATA_LIMITS;
use super::tiled::{ResidentTile, TileLayout, TiledCoverage};
use super::{CoverageDescription, CoverageStats, ElevationModel, TileState};
use crate::cache::ReuseCache;
use crate::config::PyramidConfig;
use crate::geo::Sector;
use crate::level::TileMatrixSet;
use crate::render::RenderContext;
use crate::retrieval::{ElevationDecoder, ElevationRaster, RetrievalPipeline, TileSource};
use crate::tile::{compute_column, compute_row, TileKey};
use crate::timestamp::Timestamp;

type ResidentRasters = ReuseCache<TileKey, ResidentTile<ElevationRaster>>;

/// Rows and columns of one level under a sector.
struct CellRange {
    level: usize,
    rows: RangeInclusive<u32>,
    columns: RangeInclusive<u32>,
}

impl CellRange {
    fn cell_count(&self) -> u64 {
        let rows = u64::from(self.rows.end() - self.rows.start()) + 1;
        let columns = u64::from(self.columns.end() - self.columns.start()) + 1;
        rows * columns
    }
}

/// Elevation model view over resident rasters.
struct ResidentHeights<'a> {
    tiles: &'a ResidentRasters,
    layout: &'a TileLayout,
    timestamp: Timestamp,
}

impl ResidentHeights<'_> {
    /// Cells of every level that may intersect `sector`, clamped to each
    /// level's matrix.
    fn cell_ranges(&self, sector: &Sector) -> Vec<CellRange> {
        let level_set = &self.layout.level_set;
        let origin = level_set.tile_origin();
        let mut ranges = Vec::with_capacity(level_set.level_count());

        for index in 0..level_set.level_count() {
            let (Some(level), Some(matrix)) =
                (level_set.level(index), self.layout.matrix_set.matrix(index))
            else {
                continue;
            };
            let delta = level.tile_delta();
            let last_row = matrix.matrix_height() as i32 - 1;
            let last_col = matrix.matrix_width() as i32 - 1;
            let row = |latitude| {
                let row = compute_row(delta.latitude, latitude, origin.latitude);
                row.clamp(0, last_row) as u32
            };
            let col = |longitude| {
                let col = compute_column(delta.longitude, longitude, origin.longitude);
                col.clamp(0, last_col) as u32
            };
            ranges.push(CellRange {
                level: index,
                rows: row(sector.min_latitude())..=row(sector.max_latitude()),
                columns: col(sector.min_longitude())..=col(sector.max_longitude()),
            });
        }
        ranges
    }

    /// Visit the resident tiles intersecting `sector`.
    ///
    /// Looks up the keys under the sector, or scans the store when that would
    /// mean more lookups than there are resident tiles.
    fn for_each_intersecting(
        &self,
        sector: &Sector,
        mut visit: impl FnMut(&ResidentTile<ElevationRaster>),
    ) {
        let ranges = self.cell_ranges(sector);
        let cells: u64 = ranges.iter().map(CellRange::cell_count).sum();

        if cells > self.tiles.len() as u64 {
            for (_, tile) in self.tiles.iter() {
                if tile.sector.intersects(sector) {
                    visit(tile);
                }
            }
            return;
        }

        for range in &ranges {
            for row in range.rows.clone() {
                for column in range.columns.clone() {
                    let key = TileKey::new(range.level, row, column);
                    if let Some(tile) = self.tiles.peek(&key) {
                        if tile.sector.intersects(sector) {
                            visit(tile);
                        }
                    }
                }
            }
        }
    }
}

impl ElevationModel for ResidentHeights<'_> {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn height_limits(&self, sector: &Sector) -> (f32, f32) {
        let mut limits = NO_DATA_LIMITS;
        self.for_each_intersecting(sector, |tile| {
            let (min, max) = tile.content.height_limits();
            limits.0 = limits.0.min(min);
            limits.1 = limits.1.max(max);
        });
        limits
    }
}

/// An elevation surface streamed tile by tile.
///
/// # Example
///
/// ```ignore
/// let mut coverage = TiledElevationCoverage::new(matrix_set, source, pipeline);
/// // once per frame
/// coverage.process_completions();
/// coverage.request_for_view(&rc);
/// let height = coverage.height_at(46.5, 7.9);
/// ```
pub struct TiledElevationCoverage {
    core: TiledCoverage<ElevationDecoder>,
}

impl TiledElevationCoverage {
    /// Create a coverage over `matrix_set`.
    ///
    /// # Arguments
    ///
    /// * `matrix_set` - Pyramid layout; rows of its matrices count from the north
    /// * `source` - Maps matrix cells to content descriptors
    /// * `pipeline` - Retrieval pipeline decoding elevation rasters
    pub fn new(
        matrix_set: TileMatrixSet,
        source: Arc<dyn TileSource>,
        pipeline: RetrievalPipeline<ElevationDecoder>,
    ) -> Self {
        Self {
            core: TiledCoverage::new("elevation", Some(matrix_set), source, pipeline),
        }
    }

    /// Create a coverage from a remote service description.
    ///
    /// An unusable description is logged and yields an empty coverage that
    /// never requests anything and reports no data.
    pub fn from_description(
        description: &CoverageDescription,
        source: Arc<dyn TileSource>,
        pipeline: RetrievalPipeline<ElevationDecoder>,
    ) -> Self {
        let matrix_set = match TileMatrixSet::from_description(description) {
            Ok(set) => Some(set),
            Err(e) => {
                error!(crs = %description.crs, error = %e, "elevation coverage not initialized");
                None
            }
        };
        Self {
            core: TiledCoverage::new("elevation", matrix_set, source, pipeline),
        }
    }

    /// Apply the level-of-detail settings of `config`.
    pub fn with_config(mut self, config: &PyramidConfig) -> Self {
        self.core.set_detail_control(config.lod.detail_control);
        self.core
            .set_subdivision_cache_capacity(config.cache.reuse_capacity_bytes);
        self.core
            .set_resident_capacity(config.cache.resident_capacity_bytes);
        self
    }

    /// Bound the decoded rasters kept resident to `bytes`.
    pub fn with_resident_capacity(mut self, bytes: usize) -> Self {
        self.core.set_resident_capacity(bytes);
        self
    }

    pub fn with_detail_control(mut self, detail_control: f64) -> Self {
        self.core.set_detail_control(detail_control);
        self
    }

    pub fn detail_control(&self) -> f64 {
        self.core.detail_control()
    }

    /// False when the coverage was built from an unusable description.
    pub fn is_initialized(&self) -> bool {
        self.core.layout.is_some()
    }

    /// Extent of the coverage, if initialized.
    pub fn sector(&self) -> Option<&Sector> {
        self.core.layout.as_ref().map(|l| l.level_set.sector())
    }

    /// Select the tiles `rc` needs and request the missing ones. Returns the
    /// number of retrievals issued.
    pub fn request_for_view(&mut self, rc: &RenderContext) -> usize {
        let core = &mut self.core;
        let Some(layout) = &core.layout else {
            return 0;
        };
        let heights = ResidentHeights {
            tiles: &core.resident,
            layout,
            timestamp: core.timestamp,
        };
        let keys = core.selector.select(&layout.level_zero, rc, &heights);
        core.request(&keys)
    }

    /// Request specific tiles. Returns the number of retrievals issued.
    pub fn request(&mut self, keys: &[TileKey]) -> usize {
        self.core.request(keys)
    }

    /// Apply arrived completions. A non-zero return means new heights are
    /// resident and the scene should be redrawn.
    pub fn process_completions(&mut self) -> usize {
        self.core.process_completions()
    }

    /// Wait for one completion and apply it. Returns `false` immediately when
    /// nothing is pending.
    pub async fn await_completion(&mut self) -> bool {
        self.core.await_completion().await
    }

    /// Cancel outstanding retrievals and drop every tile.
    pub fn invalidate_tiles(&mut self) {
        self.core.invalidate_tiles();
    }

    pub fn state_of(&self, key: TileKey) -> TileState {
        self.core.state_of(key)
    }

    pub fn stats(&self) -> CoverageStats {
        self.core.stats()
    }

    /// Changes whenever resident heights change.
    pub fn timestamp(&self) -> Timestamp {
        self.core.timestamp
    }

    /// Height in meters at a location, interpolated from the finest resident
    /// tile containing it. `None` outside the coverage or where nothing is
    /// resident yet.
    pub fn height_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        let layout = self.core.layout.as_ref()?;
        let level_set = &layout.level_set;
        if !level_set.sector().contains(latitude, longitude) {
            return None;
        }
        let origin = level_set.tile_origin();

        for index in (0..level_set.level_count()).rev() {
            let (Some(level), Some(matrix)) =
                (level_set.level(index), layout.matrix_set.matrix(index))
            else {
                continue;
            };
            let delta = level.tile_delta();
            let last_row = matrix.matrix_height() as i32 - 1;
            let last_col = matrix.matrix_width() as i32 - 1;
            let row = compute_row(delta.latitude, latitude, origin.latitude).clamp(0, last_row);
            let col =
                compute_column(delta.longitude, longitude, origin.longitude).clamp(0, last_col);

            let key = TileKey::new(index, row as u32, col as u32);
            if let Some(tile) = self.core.resident.peek(&key) {
                return Some(sample_tile(tile, latitude, longitude));
            }
        }
        None
    }

    /// Lowest and highest resident height over `sector`; inverted
    /// (`min > max`) when nothing resident intersects it.
    pub fn height_limits(&self, sector: &Sector) -> (f32, f32) {
        match self.heights() {
            Some(heights) => heights.height_limits(sector),
            None => NO_DATA_LIMITS,
        }
    }

    /// Bytes of decoded rasters currently resident.
    pub fn resident_bytes(&self) -> usize {
        self.core.resident_bytes()
    }

    fn heights(&self) -> Option<ResidentHeights<'_>> {
        Some(ResidentHeights {
            tiles: &self.core.resident,
            layout: self.core.layout.as_ref()?,
            timestamp: self.core.timestamp,
        })
    }
}

impl ElevationModel for TiledElevationCoverage {
    fn timestamp(&self) -> Timestamp {
        self.core.timestamp
    }

    fn height_limits(&self, sector: &Sector) -> (f32, f32) {
        TiledElevationCoverage::height_limits(self, sector)
    }
}

/// Bilinear height at a location inside `tile`. Raster samples lie on the
/// tile edges, the first row on the north edge.
fn sample_tile(tile: &ResidentTile<ElevationRaster>, latitude: f64, longitude: f64) -> f64 {
    let sector = &tile.sector;
    let raster = &tile.content;

    let fraction = |offset: f64, span: f64| if span > 0.0 { offset / span } else { 0.0 };
    let fx = fraction(longitude - sector.min_longitude(), sector.delta_longitude())
        * (raster.width() - 1) as f64;
    let fy = fraction(sector.max_latitude() - latitude, sector.delta_latitude())
        * (raster.height() - 1) as f64;
    raster.interpolate(fx, fy)
}
