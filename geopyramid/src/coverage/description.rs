//! Coverage descriptions published by remote services.
//!
//! Parsing the service's metadata document is the caller's business. What
//! reaches this module is the handful of values needed to lay out a tile
//! pyramid: the CRS the envelope is expressed in, the envelope corners, the
//! number of levels and the tile size.
//!
//! Only geographic CRSs are accepted. They differ in axis order:
//!
//! | CRS                         | Corner order       |
//! |-----------------------------|--------------------|
//! | `EPSG:4326` and its URNs    | latitude longitude |
//! | `CRS:84` and its URNs       | longitude latitude |

use crate::error::ConfigurationError;
use crate::geo::Sector;
use crate::level::TileMatrixSet;

/// Axis order of a supported geographic CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisOrder {
    LatLon,
    LonLat,
}

fn axis_order(crs: &str) -> Option<AxisOrder> {
    let crs = crs.trim().to_ascii_uppercase();
    match crs.as_str() {
        "EPSG:4326"
        | "URN:OGC:DEF:CRS:EPSG::4326"
        | "URN:OGC:DEF:CRS:EPSG:6.6:4326"
        | "HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/0/4326" => Some(AxisOrder::LatLon),
        "CRS:84"
        | "URN:OGC:DEF:CRS:OGC:1.3:CRS84"
        | "URN:OGC:DEF:CRS:OGC::CRS84"
        | "HTTP://WWW.OPENGIS.NET/DEF/CRS/OGC/1.3/CRS84" => Some(AxisOrder::LonLat),
        _ => None,
    }
}

/// The subset of a remote coverage description needed to address its tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageDescription {
    /// CRS identifier the envelope corners are expressed in.
    pub crs: String,
    /// South-west corner, in the CRS's axis order.
    pub lower_corner: (f64, f64),
    /// North-east corner, in the CRS's axis order.
    pub upper_corner: (f64, f64),
    pub level_count: usize,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl CoverageDescription {
    /// Geographic extent of the envelope.
    ///
    /// # Errors
    ///
    /// `IncompatibleCrs` for a non-geographic CRS, `MalformedEnvelope` when the
    /// corners do not form a valid sector.
    pub fn sector(&self) -> Result<Sector, ConfigurationError> {
        let order = axis_order(&self.crs)
            .ok_or_else(|| ConfigurationError::IncompatibleCrs(self.crs.clone()))?;

        let ((min_lat, min_lon), (max_lat, max_lon)) = match order {
            AxisOrder::LatLon => (self.lower_corner, self.upper_corner),
            AxisOrder::LonLat => (
                (self.lower_corner.1, self.lower_corner.0),
                (self.upper_corner.1, self.upper_corner.0),
            ),
        };

        Sector::new(min_lat, max_lat, min_lon, max_lon)
            .map_err(|e| ConfigurationError::MalformedEnvelope(e.to_string()))
    }
}

impl TileMatrixSet {
    /// Lay out the pyramid for a remote coverage.
    ///
    /// The first matrix has a single row and as many columns as keep its
    /// tiles closest to square in degrees.
    ///
    /// # Errors
    ///
    /// Any error of [`CoverageDescription::sector`], or `InvalidDescription`
    /// for a zero level count or tile size.
    pub fn from_description(description: &CoverageDescription) -> Result<Self, ConfigurationError> {
        let sector = description.sector()?;
        if sector.delta_latitude() <= 0.0 || sector.delta_longitude() <= 0.0 {
            return Err(ConfigurationError::MalformedEnvelope(format!(
                "envelope has no area: {} x {} degrees",
                sector.delta_latitude(),
                sector.delta_longitude()
            )));
        }

        let aspect = sector.delta_longitude() / sector.delta_latitude();
        let matrix_width = (aspect.round() as u32).max(1);

        let set = TileMatrixSet::from_tile_pyramid(
            sector,
            matrix_width,
            1,
            description.tile_width,
            description.tile_height,
            description.level_count,
        )?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AddressingError;

    fn description(crs: &str, lower: (f64, f64), upper: (f64, f64)) -> CoverageDescription {
        CoverageDescription {
            crs: crs.to_string(),
            lower_corner: lower,
            upper_corner: upper,
            level_count: 5,
            tile_width: 256,
            tile_height: 256,
        }
    }

    #[test]
    fn test_epsg_4326_is_lat_lon() {
        let desc = description("EPSG:4326", (-90.0, -180.0), (90.0, 180.0));
        assert_eq!(desc.sector().unwrap(), Sector::full_sphere());
    }

    #[test]
    fn test_crs84_is_lon_lat() {
        let desc = description("urn:ogc:def:crs:OGC:1.3:CRS84", (10.0, 40.0), (20.0, 45.0));
        let sector = desc.sector().unwrap();
        assert_eq!(sector.min_latitude(), 40.0);
        assert_eq!(sector.max_latitude(), 45.0);
        assert_eq!(sector.min_longitude(), 10.0);
        assert_eq!(sector.max_longitude(), 20.0);
    }

    #[test]
    fn test_projected_crs_is_rejected() {
        let desc = description("EPSG:3857", (0.0, 0.0), (1.0, 1.0));
        let err = TileMatrixSet::from_description(&desc).unwrap_err();
        assert!(matches!(err, ConfigurationError::IncompatibleCrs(crs) if crs == "EPSG:3857"));
    }

    #[test]
    fn test_inverted_envelope_is_malformed() {
        let desc = description("EPSG:4326", (10.0, 0.0), (-10.0, 5.0));
        assert!(matches!(
            desc.sector(),
            Err(ConfigurationError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_degenerate_envelope_is_malformed() {
        let desc = description("EPSG:4326", (10.0, 0.0), (10.0, 5.0));
        assert!(matches!(
            TileMatrixSet::from_description(&desc),
            Err(ConfigurationError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_global_coverage_has_two_by_one_first_matrix() {
        let desc = description("EPSG:4326", (-90.0, -180.0), (90.0, 180.0));
        let set = TileMatrixSet::from_description(&desc).unwrap();
        assert_eq!(set.matrix_count(), 5);
        let first = set.matrix(0).unwrap();
        assert_eq!((first.matrix_width(), first.matrix_height()), (2, 1));
        let last = set.matrix(4).unwrap();
        assert_eq!((last.matrix_width(), last.matrix_height()), (32, 16));
    }

    #[test]
    fn test_tall_envelope_keeps_one_column() {
        let desc = description("EPSG:4326", (0.0, 0.0), (40.0, 10.0));
        let set = TileMatrixSet::from_description(&desc).unwrap();
        assert_eq!(set.matrix(0).unwrap().matrix_width(), 1);
    }

    #[test]
    fn test_zero_levels_is_invalid_description() {
        let mut desc = description("EPSG:4326", (-90.0, -180.0), (90.0, 180.0));
        desc.level_count = 0;
        assert!(matches!(
            TileMatrixSet::from_description(&desc),
            Err(ConfigurationError::InvalidDescription(AddressingError::NoLevels))
        ));
    }
}
