//! The state machine shared by elevation and imagery coverages.
//!
//! ```text
//!   RenderContext
//!        │
//!        ▼
//! ┌──────────────┐  level-zero tiles, frustum cull, must_subdivide,
//! │ TileSelector │  subdivide_to_cache
//! └──────┬───────┘
//!        │ required keys
//!        ▼
//! ┌──────────────┐  NotRequested / Failed ──► Pending, descriptor from
//! │ TiledCoverage│  the TileSource, submit to the pipeline
//! │   ::request  │
//! └──────┬───────┘
//!        │                    ┌───────────────────┐
//!        └───────────────────►│ RetrievalPipeline │ (tokio tasks)
//!                             └─────────┬─────────┘
//!                                       │ completions
//!                                       ▼
//!                         process_completions(): commit or fail,
//!                         bump the content timestamp
//! ```
//!
//! Everything here runs on the render loop. Retrieval tasks never touch the
//! state maps; they only send completions back.
//!
//! Committed content lives in a weight-bounded [`ReuseCache`]. When a commit
//! pushes older tiles out, their keys return to `NotRequested` and the next
//! pass that needs them requests them again.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use super::{CoverageStats, ElevationModel, TileState};
use crate::cache::ReuseCache;
use crate::config::{
    DEFAULT_DETAIL_CONTROL, DEFAULT_RESIDENT_CACHE_BYTES, DEFAULT_REUSE_CACHE_BYTES,
};
use crate::error::AddressingError;
use crate::geo::Sector;
use crate::level::{LevelSet, TileMatrixSet};
use crate::render::RenderContext;
use crate::retrieval::{
    ContentDecoder, ResidentSize, RetrievalCompletion, RetrievalError, RetrievalPipeline,
    TileSource,
};
use crate::tile::{level_zero_tiles, DefaultTileFactory, SubdivisionCache, Tile, TileKey};
use crate::timestamp::Timestamp;

// =============================================================================
// Layout and selection
// =============================================================================

/// Content held for one tile.
#[derive(Debug, Clone)]
pub(crate) struct ResidentTile<T> {
    pub sector: Sector,
    pub content: T,
}

/// Addressing of a coverage built from a valid description.
pub(crate) struct TileLayout {
    pub matrix_set: TileMatrixSet,
    pub level_set: Arc<LevelSet>,
    pub level_zero: Vec<Tile>,
}

impl TileLayout {
    fn new(
        matrix_set: TileMatrixSet,
        factory: &DefaultTileFactory,
    ) -> Result<Self, AddressingError> {
        let level_set = Arc::new(matrix_set.to_level_set()?);
        let level_zero = level_zero_tiles(&level_set, factory);
        Ok(Self {
            matrix_set,
            level_set,
            level_zero,
        })
    }

    /// Sector of `key`, from the matrix whose rows count from the north.
    pub fn tile_sector(&self, key: TileKey) -> Option<Sector> {
        let matrix = self.matrix_set.matrix(key.level)?;
        if key.row >= matrix.matrix_height() {
            return None;
        }
        matrix.tile_sector(matrix.flip_row(key.row), key.column).ok()
    }
}

/// Walks the pyramid for one view and reports the tiles it needs.
pub(crate) struct TileSelector {
    subdivisions: SubdivisionCache,
    factory: DefaultTileFactory,
    detail_control: f64,
}

impl TileSelector {
    fn new(subdivision_cache_bytes: usize, detail_control: f64) -> Self {
        Self {
            subdivisions: SubdivisionCache::new(subdivision_cache_bytes),
            factory: DefaultTileFactory,
            detail_control,
        }
    }

    /// Keys of the tiles needed to draw `rc`.
    ///
    /// Visible level-zero tiles are always included so every visible point
    /// has at least coarse content. Below them, a tile is required when it is
    /// fine enough for its distance or when it sits on the finest level.
    pub fn select(
        &mut self,
        level_zero: &[Tile],
        rc: &RenderContext,
        elevation: &dyn ElevationModel,
    ) -> Vec<TileKey> {
        let mut required = Vec::new();
        for tile in level_zero {
            self.add_tile_or_descendants(tile, rc, elevation, &mut required);
        }
        trace!(
            required = required.len(),
            cached_subdivisions = self.subdivisions.len(),
            "tile selection complete"
        );
        required
    }

    fn add_tile_or_descendants(
        &mut self,
        tile: &Tile,
        rc: &RenderContext,
        elevation: &dyn ElevationModel,
        required: &mut Vec<TileKey>,
    ) {
        if let Some(frustum) = rc.frustum() {
            if !tile.bounding_box(rc, elevation).intersects_frustum(frustum) {
                return;
            }
        }

        if !tile.must_subdivide(rc, elevation, self.detail_control) {
            required.push(tile.key());
            return;
        }

        match tile.subdivide_to_cache(&self.factory, &mut self.subdivisions) {
            Some(children) => {
                if tile.level().is_first_level() {
                    required.push(tile.key());
                }
                for child in children.iter() {
                    self.add_tile_or_descendants(child, rc, elevation, required);
                }
            }
            None => required.push(tile.key()),
        }
    }
}

// =============================================================================
// Coverage core
// =============================================================================

/// Tile state, resident content and retrieval for one coverage.
pub(crate) struct TiledCoverage<D: ContentDecoder> {
    name: &'static str,
    pub layout: Option<TileLayout>,
    pub selector: TileSelector,
    source: Arc<dyn TileSource>,
    pipeline: RetrievalPipeline<D>,
    states: HashMap<TileKey, TileState>,
    pub resident: ReuseCache<TileKey, ResidentTile<D::Output>>,
    pub timestamp: Timestamp,
    requests_issued: u64,
}

impl<D: ContentDecoder> TiledCoverage<D> {
    pub fn new(
        name: &'static str,
        matrix_set: Option<TileMatrixSet>,
        source: Arc<dyn TileSource>,
        pipeline: RetrievalPipeline<D>,
    ) -> Self {
        let selector = TileSelector::new(DEFAULT_REUSE_CACHE_BYTES, DEFAULT_DETAIL_CONTROL);
        let layout = matrix_set.and_then(|set| match TileLayout::new(set, &selector.factory) {
            Ok(layout) => Some(layout),
            Err(e) => {
                error!(
                    coverage = name,
                    error = %e,
                    "invalid tile matrix set, coverage left empty"
                );
                None
            }
        });

        if let Some(layout) = &layout {
            info!(
                coverage = name,
                levels = layout.level_set.level_count(),
                level_zero_tiles = layout.level_zero.len(),
                "coverage initialized"
            );
        }

        Self {
            name,
            layout,
            selector,
            source,
            pipeline,
            states: HashMap::new(),
            resident: ReuseCache::new(DEFAULT_RESIDENT_CACHE_BYTES),
            timestamp: Timestamp::next(),
            requests_issued: 0,
        }
    }

    pub fn set_detail_control(&mut self, detail_control: f64) {
        self.selector.detail_control = detail_control;
    }

    pub fn detail_control(&self) -> f64 {
        self.selector.detail_control
    }

    /// Replace the subdivision cache with an empty one of `bytes` capacity.
    pub fn set_subdivision_cache_capacity(&mut self, bytes: usize) {
        self.selector.subdivisions = SubdivisionCache::new(bytes);
    }

    /// Change how many bytes of decoded content stay resident. Tiles that no
    /// longer fit are dropped and become requestable again.
    pub fn set_resident_capacity(&mut self, bytes: usize) {
        let evicted = self.resident.set_capacity(bytes);
        if !evicted.is_empty() {
            self.forget_evicted(&evicted);
            self.timestamp = Timestamp::next();
        }
    }

    /// Bytes of decoded content currently resident.
    pub fn resident_bytes(&self) -> usize {
        self.resident.used_capacity()
    }

    pub fn state_of(&self, key: TileKey) -> TileState {
        self.states.get(&key).copied().unwrap_or_default()
    }

    /// Run the LOD walk for `rc` and request what it needs.
    pub fn request_for_view(
        &mut self,
        rc: &RenderContext,
        elevation: &dyn ElevationModel,
    ) -> usize {
        let Some(layout) = &self.layout else {
            return 0;
        };
        let keys = self.selector.select(&layout.level_zero, rc, elevation);
        self.request(&keys)
    }

    /// Issue retrievals for every requestable key. Returns how many were issued.
    ///
    /// Pending and resident keys are skipped, as are keys outside the
    /// pyramid and keys the source has no content for.
    pub fn request(&mut self, keys: &[TileKey]) -> usize {
        let Some(layout) = &self.layout else {
            return 0;
        };

        let mut issued = 0;
        for &key in keys {
            // Needed again: move it to the recent end of the resident store.
            if self.resident.get(&key).is_some() {
                continue;
            }
            if !self.state_of(key).is_requestable() {
                continue;
            }
            let Some(matrix) = layout.matrix_set.matrix(key.level) else {
                debug!(coverage = self.name, key = %key, "level outside pyramid, not requested");
                continue;
            };
            if key.row >= matrix.matrix_height() || key.column >= matrix.matrix_width() {
                debug!(coverage = self.name, key = %key, "tile outside matrix, not requested");
                continue;
            }
            let Some(descriptor) = self
                .source
                .descriptor(matrix, matrix.flip_row(key.row), key.column)
            else {
                trace!(coverage = self.name, key = %key, "source has no content for tile");
                continue;
            };

            self.states.insert(key, TileState::Pending);
            self.pipeline.submit(key, descriptor);
            self.requests_issued += 1;
            issued += 1;
        }

        if issued > 0 {
            debug!(coverage = self.name, issued, "tile retrievals issued");
        }
        issued
    }

    /// Apply every completion that has arrived. Returns the number of tiles
    /// whose content became resident.
    pub fn process_completions(&mut self) -> usize {
        let mut committed = 0;
        while let Some(completion) = self.pipeline.try_next_completion() {
            if self.apply(completion) {
                committed += 1;
            }
        }
        committed
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `false` without waiting when nothing is pending. Returns
    /// `true` once a completion was applied, whatever its outcome.
    pub async fn await_completion(&mut self) -> bool {
        if !self.states.values().any(|state| *state == TileState::Pending) {
            return false;
        }
        match self.pipeline.next_completion().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, completion: RetrievalCompletion<D::Output>) -> bool {
        let RetrievalCompletion { key, result, .. } = completion;
        if self.state_of(key) != TileState::Pending {
            trace!(coverage = self.name, key = %key, "completion for tile no longer pending");
            return false;
        }

        match result {
            Ok(content) => {
                let Some(sector) = self.layout.as_ref().and_then(|l| l.tile_sector(key)) else {
                    warn!(coverage = self.name, key = %key, "retrieved tile has no sector");
                    self.states.insert(key, TileState::Failed);
                    return false;
                };
                let weight = content.resident_size();
                let evicted = self.resident.put(key, ResidentTile { sector, content }, weight);
                if !self.resident.contains_key(&key) {
                    warn!(
                        coverage = self.name,
                        key = %key,
                        weight,
                        capacity = self.resident.capacity(),
                        "tile larger than resident capacity, dropped"
                    );
                    self.states.insert(key, TileState::Failed);
                    return false;
                }
                self.forget_evicted(&evicted);
                self.states.insert(key, TileState::Succeeded);
                self.timestamp = Timestamp::next();
                debug!(
                    coverage = self.name,
                    key = %key,
                    timestamp = %self.timestamp,
                    "tile committed"
                );
                true
            }
            Err(RetrievalError::Cancelled) => {
                self.states.remove(&key);
                false
            }
            Err(e) => {
                warn!(coverage = self.name, key = %key, error = %e, "tile retrieval failed");
                self.states.insert(key, TileState::Failed);
                false
            }
        }
    }

    fn forget_evicted(&mut self, keys: &[TileKey]) {
        for key in keys {
            self.states.remove(key);
        }
        if !keys.is_empty() {
            debug!(
                coverage = self.name,
                evicted = keys.len(),
                resident_bytes = self.resident.used_capacity(),
                "resident tiles evicted"
            );
        }
    }

    /// Cancel every retrieval and forget all tiles.
    ///
    /// The pipeline stays usable; the next pass requests from scratch.
    pub fn invalidate_tiles(&mut self) {
        let pending = self.stats().pending;
        self.pipeline.cancel_all();
        self.states.clear();
        self.resident.clear();
        self.timestamp = Timestamp::next();
        info!(coverage = self.name, cancelled = pending, "coverage tiles invalidated");
    }

    pub fn stats(&self) -> CoverageStats {
        let mut stats = CoverageStats {
            requests_issued: self.requests_issued,
            ..CoverageStats::default()
        };
        for state in self.states.values() {
            match state {
                TileState::Pending => stats.pending += 1,
                TileState::Succeeded => stats.succeeded += 1,
                TileState::Failed => stats.failed += 1,
                TileState::NotRequested => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::FlatElevationModel;
    use crate::geo::{Position, Sector};
    use crate::projection::{Ellipsoid, EquirectangularProjection, Globe, Vec3};
    use crate::render::{Camera, Frustum, Viewport};

    fn layout(levels: usize) -> TileLayout {
        let set =
            TileMatrixSet::from_tile_pyramid(Sector::full_sphere(), 2, 1, 256, 256, levels).unwrap();
        TileLayout::new(set, &DefaultTileFactory).unwrap()
    }

    fn selector() -> TileSelector {
        TileSelector::new(DEFAULT_REUSE_CACHE_BYTES, DEFAULT_DETAIL_CONTROL)
    }

    fn context(latitude: f64, longitude: f64, altitude: f64) -> RenderContext {
        let globe = Globe::new(
            Ellipsoid::wgs84(),
            Arc::new(EquirectangularProjection::new()),
        );
        RenderContext::new(
            globe,
            Camera::new(Position::new(latitude, longitude, altitude)),
            Viewport::new(1000, 1000),
        )
    }

    #[test]
    fn test_distant_camera_needs_only_level_zero() {
        let layout = layout(5);
        let mut selector = selector();
        let rc = context(0.0, 0.0, 1.0e9);

        let mut keys = selector.select(&layout.level_zero, &rc, &FlatElevationModel);
        keys.sort();
        assert_eq!(keys, vec![TileKey::new(0, 0, 0), TileKey::new(0, 0, 1)]);
    }

    #[test]
    fn test_close_camera_reaches_finest_level() {
        let layout = layout(5);
        let mut selector = selector();
        let rc = context(1.0, 1.0, 1.0e4);

        let keys = selector.select(&layout.level_zero, &rc, &FlatElevationModel);
        // Level 4 tiles are 11.25 degrees; the one under the camera is required.
        assert!(keys.contains(&TileKey::new(4, 8, 16)));
        // Level-zero tiles stay required as a fallback.
        assert!(keys.contains(&TileKey::new(0, 0, 1)));
        assert!(!selector.subdivisions.is_empty());
    }

    #[test]
    fn test_repeated_selection_reuses_subdivisions() {
        let layout = layout(4);
        let mut selector = selector();
        let rc = context(0.5, 0.5, 1.0e5);

        let first = selector.select(&layout.level_zero, &rc, &FlatElevationModel);
        let cached = selector.subdivisions.len();
        let second = selector.select(&layout.level_zero, &rc, &FlatElevationModel);
        assert_eq!(first, second);
        assert_eq!(selector.subdivisions.len(), cached);
    }

    #[test]
    fn test_frustum_culls_everything_outside() {
        let layout = layout(3);
        let mut selector = selector();
        let far_away = Frustum::from_box(
            Vec3::new(1.0e9, 1.0e9, 1.0e9),
            Vec3::new(2.0e9, 2.0e9, 2.0e9),
        );
        let rc = context(0.0, 0.0, 1.0e9).with_frustum(far_away);

        assert!(selector
            .select(&layout.level_zero, &rc, &FlatElevationModel)
            .is_empty());
    }

    #[test]
    fn test_layout_tile_sector_uses_south_origin_rows() {
        let layout = layout(2);
        // Level 1 is 4x2 tiles of 90 degrees; row 0 is the southern row.
        let south_west = layout.tile_sector(TileKey::new(1, 0, 0)).unwrap();
        assert_eq!(south_west.min_latitude(), -90.0);
        assert_eq!(south_west.max_latitude(), 0.0);
        assert_eq!(south_west.min_longitude(), -180.0);
        assert!(layout.tile_sector(TileKey::new(1, 2, 0)).is_none());
        assert!(layout.tile_sector(TileKey::new(2, 0, 0)).is_none());
    }
}
