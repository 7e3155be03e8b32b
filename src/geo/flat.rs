//! Flat integer projection
//!
//! Maps geographic positions onto a signed integer grid for cheap
//! bounding-box and distance work inside the path solver. One grid unit is
//! roughly 25 m; the projection is derived from the task bounds and stays
//! stable while the task shape is stable.

use libm::{cos, round, sqrt};

use super::{GeoBounds, GeoPoint, EARTH_RADIUS_M};

/// Grid resolution in meters per unit.
pub const FLAT_UNIT_M: f64 = 25.0;

const FLAT_SCALE: f64 = EARTH_RADIUS_M / FLAT_UNIT_M;

/// Projected integer Cartesian position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlatPoint {
    pub x: i32,
    pub y: i32,
}

impl FlatPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance in grid units.
    pub fn square_distance(&self, other: &FlatPoint) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Euclidean distance in grid units, rounded down.
    pub fn distance(&self, other: &FlatPoint) -> u32 {
        sqrt(self.square_distance(other) as f64) as u32
    }
}

/// Projection parameters: a task-local tangent plane around the bounds
/// center, with longitude compressed by the cosine of the center latitude.
#[derive(Clone, Copy, Debug)]
pub struct FlatProjection {
    center: GeoPoint,
    cos_center_lat: f64,
}

impl FlatProjection {
    /// Projection centered on the given bounds; falls back to the null
    /// island origin for empty bounds so projecting stays total.
    pub fn new(bounds: &GeoBounds) -> Self {
        let center = if bounds.is_valid() {
            bounds.center()
        } else {
            GeoPoint::new(0.0, 0.0)
        };
        Self::around(center)
    }

    /// Projection centered on a single position.
    pub fn around(center: GeoPoint) -> Self {
        Self {
            center,
            cos_center_lat: cos(center.latitude),
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn project(&self, p: GeoPoint) -> FlatPoint {
        let x = (p.longitude - self.center.longitude) * self.cos_center_lat * FLAT_SCALE;
        let y = (p.latitude - self.center.latitude) * FLAT_SCALE;
        FlatPoint::new(round(x) as i32, round(y) as i32)
    }
}

impl Default for FlatProjection {
    fn default() -> Self {
        Self::around(GeoPoint::new(0.0, 0.0))
    }
}

/// Axis-aligned box in projected coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlatBoundingBox {
    min: FlatPoint,
    max: FlatPoint,
}

impl FlatBoundingBox {
    /// Box around a point, inflated by `radius` units.
    pub fn from_point(p: FlatPoint, radius: i32) -> Self {
        Self {
            min: FlatPoint::new(p.x.saturating_sub(radius), p.y.saturating_sub(radius)),
            max: FlatPoint::new(p.x.saturating_add(radius), p.y.saturating_add(radius)),
        }
    }

    /// Empty box; extending with any point makes it valid.
    pub fn empty() -> Self {
        Self {
            min: FlatPoint::new(i32::MAX, i32::MAX),
            max: FlatPoint::new(i32::MIN, i32::MIN),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn extend(&mut self, p: FlatPoint) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Grow the box by one unit on every side.
    pub fn inflate(&mut self) {
        self.min.x = self.min.x.saturating_sub(1);
        self.min.y = self.min.y.saturating_sub(1);
        self.max.x = self.max.x.saturating_add(1);
        self.max.y = self.max.y.saturating_add(1);
    }

    pub fn overlaps(&self, other: &FlatBoundingBox) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}
