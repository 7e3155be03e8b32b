//! Geographic primitives
//!
//! Pure functions and types for spherical geometry: positions in radians,
//! great-circle distance and bearing, destination points, and geographic
//! bounding boxes. All trigonometry goes through `libm` so the crate stays
//! free of a float runtime.

pub mod flat;
pub mod search;

use libm::{asin, atan2, cos, fabs, sin, sqrt};

/// Mean earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
const TWO_PI: f64 = 2.0 * core::f64::consts::PI;

/// Normalize an angle to the (-pi, pi] range.
pub fn normalize_relative(angle: f64) -> f64 {
    let mut a = angle % TWO_PI;
    if a > core::f64::consts::PI {
        a -= TWO_PI;
    } else if a <= -core::f64::consts::PI {
        a += TWO_PI;
    }
    a
}

/// Normalize an angle to the [0, 2*pi) range.
pub fn normalize_bearing(angle: f64) -> f64 {
    let a = angle % TWO_PI;
    if a < 0.0 {
        a + TWO_PI
    } else {
        a
    }
}

/// Bisector of the angle between two bearings, on the short side.
pub fn half_angle(a: f64, b: f64) -> f64 {
    normalize_bearing(a + normalize_relative(b - a) / 2.0)
}

/// Geographic position, latitude/longitude in radians.
///
/// The invalid sentinel carries NaN coordinates; always check `is_valid()`
/// before doing geometry with a position received from outside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    /// Latitude in radians, positive north
    pub latitude: f64,
    /// Longitude in radians, positive east
    pub longitude: f64,
}

impl GeoPoint {
    /// Sentinel for "no position".
    pub const INVALID: Self = Self {
        latitude: f64::NAN,
        longitude: f64::NAN,
    };

    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude * DEG_TO_RAD, longitude * DEG_TO_RAD)
    }

    pub fn is_valid(&self) -> bool {
        !self.latitude.is_nan() && !self.longitude.is_nan()
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance(&self, other: &GeoPoint) -> f64 {
        let delta_lat = other.latitude - self.latitude;
        let delta_lon = other.longitude - self.longitude;

        let sin_dlat = sin(delta_lat / 2.0);
        let sin_dlon = sin(delta_lon / 2.0);
        let a = sin_dlat * sin_dlat
            + cos(self.latitude) * cos(other.latitude) * sin_dlon * sin_dlon;
        let c = 2.0 * atan2(sqrt(a), sqrt(1.0 - a));
        EARTH_RADIUS_M * c
    }

    /// Forward azimuth toward `other`, radians in [0, 2*pi).
    pub fn bearing(&self, other: &GeoPoint) -> f64 {
        let delta_lon = other.longitude - self.longitude;
        let y = sin(delta_lon) * cos(other.latitude);
        let x = cos(self.latitude) * sin(other.latitude)
            - sin(self.latitude) * cos(other.latitude) * cos(delta_lon);
        normalize_bearing(atan2(y, x))
    }

    /// Destination point at `distance` meters along `bearing` radians.
    pub fn offset(&self, distance: f64, bearing: f64) -> GeoPoint {
        let angular = distance / EARTH_RADIUS_M;
        let sin_lat = sin(self.latitude) * cos(angular)
            + cos(self.latitude) * sin(angular) * cos(bearing);
        let latitude = asin(sin_lat);
        let longitude = self.longitude
            + atan2(
                sin(bearing) * sin(angular) * cos(self.latitude),
                cos(angular) - sin(self.latitude) * sin_lat,
            );
        GeoPoint::new(latitude, longitude)
    }

    /// The point at `distance` meters along the great circle toward `other`.
    ///
    /// Clamps at `other` when the requested distance exceeds the separation.
    pub fn intermediate_point(&self, other: &GeoPoint, distance: f64) -> GeoPoint {
        if distance <= 0.0 {
            return *self;
        }
        if distance >= self.distance(other) {
            return *other;
        }
        self.offset(distance, self.bearing(other))
    }
}

/// Latitude/longitude extremes of a set of positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBounds {
    /// Empty bounds; extending with any valid point makes them valid.
    pub const INVALID: Self = Self {
        min_latitude: f64::INFINITY,
        max_latitude: f64::NEG_INFINITY,
        min_longitude: f64::INFINITY,
        max_longitude: f64::NEG_INFINITY,
    };

    pub fn from_point(p: GeoPoint) -> Self {
        Self {
            min_latitude: p.latitude,
            max_latitude: p.latitude,
            min_longitude: p.longitude,
            max_longitude: p.longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_latitude <= self.max_latitude && self.min_longitude <= self.max_longitude
    }

    pub fn extend(&mut self, p: GeoPoint) {
        if !p.is_valid() {
            return;
        }
        self.min_latitude = self.min_latitude.min(p.latitude);
        self.max_latitude = self.max_latitude.max(p.latitude);
        self.min_longitude = self.min_longitude.min(p.longitude);
        self.max_longitude = self.max_longitude.max(p.longitude);
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        )
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Absolute angular difference between two bearings, radians in [0, pi].
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    fabs(normalize_relative(b - a))
}
