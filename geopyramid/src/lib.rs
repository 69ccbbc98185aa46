//! GeoPyramid - tiled level-of-detail streaming of terrain and imagery
//!
//! The globe is cut into a pyramid of ever finer tiles. Each frame the
//! renderer walks the pyramid from the coarsest level, keeps subdividing
//! tiles whose texels look too coarse from the camera, and asks the
//! coverages for the tiles it ended up with. Missing tiles are fetched in
//! the background and show up a few frames later.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ coverage    TiledElevationCoverage / TiledImageryCoverage   │
//! │             per-key state machine, height and image queries │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │ tile        Tile, TileKey,   │ retrieval   sources,         │
//! │             LOD test, bounds │             transports,      │
//! │ cache       ReuseCache       │             decoders, tokio  │
//! │                              │             pipeline         │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │ level       LevelSet, TileMatrixSet                         │
//! │ render      RenderContext, Frustum, per-frame memo          │
//! │ projection  Mercator, equirectangular, Globe                │
//! │ geo         Location, Sector                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Level-of-detail evaluation is single-threaded and runs on the render
//! loop. Only retrieval runs on tokio tasks, and it talks back to the
//! coverages through a channel.

pub mod cache;
pub mod config;
pub mod coverage;
pub mod error;
pub mod geo;
pub mod level;
pub mod logging;
pub mod projection;
pub mod render;
pub mod retrieval;
pub mod tile;
pub mod timestamp;

pub use config::{load_config, PyramidConfig};
pub use coverage::{
    CoverageDescription, CoverageStats, ElevationModel, TileState, TiledElevationCoverage,
    TiledImageryCoverage,
};
pub use error::{AddressingError, ConfigurationError};
pub use geo::{Location, Position, Sector};
pub use level::{Level, LevelSet, TileMatrix, TileMatrixSet};
pub use render::{Camera, RenderContext, Viewport};
pub use retrieval::{RetrievalError, RetrievalPipeline};
pub use tile::{Tile, TileKey};
pub use timestamp::Timestamp;
