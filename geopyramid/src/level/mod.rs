//! Static addressing of tile pyramids.
//!
//! A [`LevelSet`] describes how one sector is subdivided into progressively
//! finer [`Level`]s, each level halving the tile delta of the one before it.
//! A [`TileMatrixSet`] is the service-oriented view of the same pyramid: each
//! [`TileMatrix`] carries explicit matrix and tile dimensions, with rows
//! counted from the north edge as tile services do.

mod level_set;
mod tile_matrix;

pub use level_set::{Level, LevelSet};
pub use tile_matrix::{TileMatrix, TileMatrixSet};
