//! Geographic locations and positions.

use std::fmt;

/// A geographic location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Location {
    /// Create a new location from degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Wraps a latitude into [-90, 90], reflecting over the poles.
    pub fn normalize_latitude(degrees: f64) -> f64 {
        let lat = degrees % 180.0;
        if lat > 90.0 {
            180.0 - lat
        } else if lat < -90.0 {
            -180.0 - lat
        } else {
            lat
        }
    }

    /// Wraps a longitude into [-180, 180].
    pub fn normalize_longitude(degrees: f64) -> f64 {
        let lon = degrees % 360.0;
        if lon > 180.0 {
            lon - 360.0
        } else if lon < -180.0 {
            lon + 360.0
        } else {
            lon
        }
    }

    /// Great circle distance to another location, in radians.
    ///
    /// Uses the haversine formula, which stays accurate for short arcs.
    pub fn great_circle_distance(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }

    /// Location reached by travelling `distance_radians` along a great circle
    /// starting at `heading_degrees` (clockwise from north).
    pub fn destination(&self, heading_degrees: f64, distance_radians: f64) -> Location {
        if distance_radians == 0.0 {
            return *self;
        }

        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let heading = heading_degrees.to_radians();

        let lat2 = (lat1.sin() * distance_radians.cos()
            + lat1.cos() * distance_radians.sin() * heading.cos())
        .asin();
        let lon2 = lon1
            + (heading.sin() * distance_radians.sin() * lat1.cos())
                .atan2(distance_radians.cos() - lat1.sin() * lat2.sin());

        Location::new(
            lat2.to_degrees(),
            Self::normalize_longitude(lon2.to_degrees()),
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

/// A geographic location with an altitude in meters above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// The location of this position, discarding altitude.
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}
