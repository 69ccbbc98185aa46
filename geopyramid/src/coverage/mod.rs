//! Tiled content coverages.
//!
//! A coverage turns a view into the set of tiles it needs, keeps a
//! per-key retrieval state, and exposes what has arrived:
//!
//! - [`TiledElevationCoverage`]: heights, usable as an [`ElevationModel`]
//! - [`TiledImageryCoverage`]: decoded RGBA images per tile
//!
//! Both are driven from the render loop:
//!
//! ```text
//! frame N:  process_completions()  ──► commit / fail arrived tiles
//!           request_for_view(rc)   ──► LOD walk, issue missing tiles
//!           height_at / image_for  ──► whatever is resident now
//! ```
//!
//! Retrieval never blocks a frame. A tile that has not arrived is simply
//! absent, and queries fall back to coarser resident tiles.

mod description;
mod elevation;
mod imagery;
mod model;
mod state;
mod tiled;

pub use description::CoverageDescription;
pub use elevation::TiledElevationCoverage;
pub use imagery::TiledImageryCoverage;
pub use model::{ElevationModel, FlatElevationModel};
pub use state::{CoverageStats, TileState};
