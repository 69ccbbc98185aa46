//! Crate-level error types.
//!
//! Retrieval failures have their own type in [`crate::retrieval`] because they
//! never escape a coverage; the errors here are the ones surfaced to callers
//! at construction or initialization time.

use thiserror::Error;

/// Malformed addressing configuration: sectors, levels and tile matrices.
///
/// These are fatal to the object being constructed and are reported from
/// constructors instead of being discovered on the render path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressingError {
    /// Sector bounds are outside the globe or inverted.
    #[error("Invalid sector [{min_lat}, {max_lat}] x [{min_lon}, {max_lon}]: {reason}")]
    InvalidSector {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        reason: String,
    },

    /// A level set or tile matrix set was configured with no levels.
    #[error("Level count must be at least 1")]
    NoLevels,

    /// Tile delta must be strictly positive and finite.
    #[error("Invalid tile delta {lat}° x {lon}°")]
    InvalidTileDelta { lat: f64, lon: f64 },

    /// Tile pixel dimensions must be non-zero.
    #[error("Invalid tile dimensions {width}x{height}")]
    InvalidTileDimensions { width: u32, height: u32 },

    /// Matrix dimensions must be non-zero.
    #[error("Invalid matrix dimensions {width}x{height}")]
    InvalidMatrixDimensions { width: u32, height: u32 },

    /// Requested a level index the pyramid does not have.
    #[error("Level {index} out of range (level count {count})")]
    LevelOutOfRange { index: usize, count: usize },

    /// Row or column outside a tile matrix.
    #[error("Tile ({row}, {col}) outside matrix {ordinal} ({width}x{height})")]
    TileOutOfRange {
        ordinal: usize,
        row: u32,
        col: u32,
        width: u32,
        height: u32,
    },
}

/// Configuration problems: remote coverage descriptions and config files.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The coverage is published in a coordinate reference system we cannot use.
    #[error("Incompatible coordinate reference system: {0}")]
    IncompatibleCrs(String),

    /// The coverage envelope could not be turned into a sector.
    #[error("Malformed coverage envelope: {0}")]
    MalformedEnvelope(String),

    /// The coverage description is structurally invalid.
    #[error("Invalid coverage description: {0}")]
    InvalidDescription(#[from] AddressingError),

    /// A configuration file value failed validation.
    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
