//! Axis-aligned geographic rectangles.

use std::fmt;

use super::Location;
use crate::error::AddressingError;

/// An immutable latitude/longitude rectangle in degrees.
///
/// A sector whose bounds are `NaN` is the empty sentinel returned by
/// [`Sector::empty`]. Valid sectors satisfy `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
}

impl Sector {
    /// Create a validated sector from its bounds.
    ///
    /// # Errors
    ///
    /// Returns `AddressingError::InvalidSector` when a bound is not finite,
    /// lies outside [-90, 90] x [-180, 180], or when min exceeds max.
    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Result<Self, AddressingError> {
        let invalid = |reason: &str| AddressingError::InvalidSector {
            min_lat: min_latitude,
            max_lat: max_latitude,
            min_lon: min_longitude,
            max_lon: max_longitude,
            reason: reason.to_string(),
        };

        let bounds = [min_latitude, max_latitude, min_longitude, max_longitude];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(invalid("bounds must be finite"));
        }
        if !(-90.0..=90.0).contains(&min_latitude) || !(-90.0..=90.0).contains(&max_latitude) {
            return Err(invalid("latitude outside [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&min_longitude) || !(-180.0..=180.0).contains(&max_longitude)
        {
            return Err(invalid("longitude outside [-180, 180]"));
        }
        if min_latitude > max_latitude || min_longitude > max_longitude {
            return Err(invalid("minimum exceeds maximum"));
        }

        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }

    /// Create a sector from its south-west corner and angular extent.
    ///
    /// Unchecked; used on hot paths where the caller derives bounds from an
    /// already validated grid.
    pub fn from_degrees(
        min_latitude: f64,
        min_longitude: f64,
        delta_latitude: f64,
        delta_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude: min_latitude + delta_latitude,
            min_longitude,
            max_longitude: min_longitude + delta_longitude,
        }
    }

    /// Create a sector from bounds already known to be valid.
    pub(crate) fn from_bounds(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        debug_assert!(min_latitude <= max_latitude && min_longitude <= max_longitude);
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    /// The whole globe.
    pub fn full_sphere() -> Self {
        Self {
            min_latitude: -90.0,
            max_latitude: 90.0,
            min_longitude: -180.0,
            max_longitude: 180.0,
        }
    }

    /// The empty sentinel. Contains nothing and intersects nothing.
    pub fn empty() -> Self {
        Self {
            min_latitude: f64::NAN,
            max_latitude: f64::NAN,
            min_longitude: f64::NAN,
            max_longitude: f64::NAN,
        }
    }

    pub fn min_latitude(&self) -> f64 {
        self.min_latitude
    }

    pub fn max_latitude(&self) -> f64 {
        self.max_latitude
    }

    pub fn min_longitude(&self) -> f64 {
        self.min_longitude
    }

    pub fn max_longitude(&self) -> f64 {
        self.max_longitude
    }

    pub fn delta_latitude(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    pub fn delta_longitude(&self) -> f64 {
        self.max_longitude - self.min_longitude
    }

    pub fn centroid_latitude(&self) -> f64 {
        0.5 * (self.min_latitude + self.max_latitude)
    }

    pub fn centroid_longitude(&self) -> f64 {
        0.5 * (self.min_longitude + self.max_longitude)
    }

    pub fn centroid(&self) -> Location {
        Location::new(self.centroid_latitude(), self.centroid_longitude())
    }

    /// True for the `NaN` sentinel.
    pub fn is_empty(&self) -> bool {
        self.min_latitude.is_nan()
            || self.max_latitude.is_nan()
            || self.min_longitude.is_nan()
            || self.max_longitude.is_nan()
    }

    /// True when this sector spans the whole globe.
    pub fn is_full_sphere(&self) -> bool {
        self.min_latitude == -90.0
            && self.max_latitude == 90.0
            && self.min_longitude == -180.0
            && self.max_longitude == 180.0
    }

    /// Inclusive point containment.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        !self.is_empty()
            && latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }

    /// True when `other` lies entirely inside this sector.
    pub fn contains_sector(&self, other: &Sector) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min_latitude >= self.min_latitude
            && other.max_latitude <= self.max_latitude
            && other.min_longitude >= self.min_longitude
            && other.max_longitude <= self.max_longitude
    }

    /// True when the interiors overlap. Sectors sharing only an edge do not
    /// intersect.
    pub fn intersects(&self, other: &Sector) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_latitude < other.max_latitude
            && self.max_latitude > other.min_latitude
            && self.min_longitude < other.max_longitude
            && self.max_longitude > other.min_longitude
    }

    /// Like [`Sector::intersects`] but shared edges count.
    pub fn intersects_or_next_to(&self, other: &Sector) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_latitude <= other.max_latitude
            && self.max_latitude >= other.min_latitude
            && self.min_longitude <= other.max_longitude
            && self.max_longitude >= other.min_longitude
    }

    /// The overlapping region, or `None` when the interiors are disjoint.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.intersects(other) {
            return None;
        }
        Some(Sector {
            min_latitude: self.min_latitude.max(other.min_latitude),
            max_latitude: self.max_latitude.min(other.max_latitude),
            min_longitude: self.min_longitude.max(other.min_longitude),
            max_longitude: self.max_longitude.min(other.max_longitude),
        })
    }

    /// The smallest sector containing both. The empty sector is the identity.
    pub fn union(&self, other: &Sector) -> Sector {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Sector {
            min_latitude: self.min_latitude.min(other.min_latitude),
            max_latitude: self.max_latitude.max(other.max_latitude),
            min_longitude: self.min_longitude.min(other.min_longitude),
            max_longitude: self.max_longitude.max(other.max_longitude),
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Sector(empty)");
        }
        write!(
            f,
            "Sector(lat {}..{}, lon {}..{})",
            self.min_latitude, self.max_latitude, self.min_longitude, self.max_longitude
        )
    }
}
