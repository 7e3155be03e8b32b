//! Search points
//!
//! A search point pairs a geographic position with its projected grid
//! position. The path solver ranks candidates by grid distance and the
//! scoring layer reports great-circle sums over the chosen points, so both
//! representations travel together. Equality uses the projected coordinates.

use heapless::Vec;

use super::flat::{FlatPoint, FlatProjection};
use super::GeoPoint;

#[derive(Clone, Copy, Debug)]
pub struct SearchPoint {
    location: GeoPoint,
    flat: FlatPoint,
}

impl SearchPoint {
    pub fn new(location: GeoPoint, projection: &FlatProjection) -> Self {
        Self {
            location,
            flat: projection.project(location),
        }
    }

    /// Search point with a zeroed grid position, for use before the task
    /// projection exists.
    pub const fn unprojected(location: GeoPoint) -> Self {
        Self {
            location,
            flat: FlatPoint::new(0, 0),
        }
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn flat(&self) -> FlatPoint {
        self.flat
    }

    /// Recompute the grid position under a new projection.
    pub fn reproject(&mut self, projection: &FlatProjection) {
        self.flat = projection.project(self.location);
    }

    pub fn flat_square_distance(&self, other: &SearchPoint) -> i64 {
        self.flat.square_distance(&other.flat)
    }

    pub fn flat_distance(&self, other: &SearchPoint) -> u32 {
        self.flat.distance(&other.flat)
    }
}

impl PartialEq for SearchPoint {
    fn eq(&self, other: &Self) -> bool {
        self.flat == other.flat
    }
}

impl Eq for SearchPoint {}

fn cross(o: &SearchPoint, a: &SearchPoint, b: &SearchPoint) -> i64 {
    let oa_x = (a.flat.x - o.flat.x) as i64;
    let oa_y = (a.flat.y - o.flat.y) as i64;
    let ob_x = (b.flat.x - o.flat.x) as i64;
    let ob_y = (b.flat.y - o.flat.y) as i64;
    oa_x * ob_y - oa_y * ob_x
}

/// Replace `points` with its convex hull (monotone chain over the grid
/// coordinates). Interior points cannot be part of an extremal path, so
/// sampled polygons are pruned with this after every insertion to keep them
/// bounded.
pub fn prune_interior<const N: usize>(points: &mut Vec<SearchPoint, N>) {
    if points.len() <= 3 {
        return;
    }

    points.sort_unstable_by(|a, b| (a.flat.x, a.flat.y).cmp(&(b.flat.x, b.flat.y)));

    let mut lower: Vec<SearchPoint, N> = Vec::new();
    for &p in points.iter() {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], &p) <= 0
        {
            lower.pop();
        }
        let _ = lower.push(p);
    }

    let mut upper: Vec<SearchPoint, N> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], &p) <= 0
        {
            upper.pop();
        }
        let _ = upper.push(p);
    }

    // each chain repeats the other's endpoint
    points.clear();
    for chain in [&lower, &upper] {
        for &p in &chain[..chain.len() - 1] {
            let _ = points.push(p);
        }
    }
}
