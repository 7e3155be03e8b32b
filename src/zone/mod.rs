//! Observation zones
//!
//! The geometric region around a turnpoint whose crossing counts as
//! rounding that point. The original engine models these as a class
//! hierarchy; here a tagged shape enum plus one orientation angle covers
//! the same set: all non-cylinder shapes are sectors of some angular width
//! whose facing direction is derived from the neighbouring legs.

use heapless::Vec;
use libm::fabs;

use crate::geo::{
    bearing_difference, half_angle, normalize_bearing, GeoPoint,
};

/// Upper bound on boundary polygon sampling.
pub const MAX_BOUNDARY_POINTS: usize = 24;

/// DAeC keyhole sector radius.
pub const KEYHOLE_RADIUS_M: f64 = 10_000.0;
/// DAeC keyhole inner cylinder radius.
pub const KEYHOLE_INNER_RADIUS_M: f64 = 500.0;

const QUADRANT_ANGLE: f64 = core::f64::consts::FRAC_PI_2;

/// Zone geometry, tagged by shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoneShape {
    /// Full circle around the reference.
    Cylinder { radius: f64 },
    /// Gate line of the given total length, perpendicular to the leg.
    Line { length: f64 },
    /// 90 degree photo sector bisecting the legs.
    FaiSector { radius: f64 },
    /// Sector of arbitrary angular width bisecting the legs.
    SymmetricQuadrant { radius: f64, angle: f64 },
    /// DAeC keyhole: sector plus a small inner cylinder.
    Keyhole {
        radius: f64,
        inner_radius: f64,
        angle: f64,
    },
}

impl ZoneShape {
    /// Standard DAeC keyhole parameters.
    pub const fn daec_keyhole() -> Self {
        Self::Keyhole {
            radius: KEYHOLE_RADIUS_M,
            inner_radius: KEYHOLE_INNER_RADIUS_M,
            angle: QUADRANT_ANGLE,
        }
    }

    /// The cylinder radius, if this shape is a plain cylinder. Start and
    /// finish ring subtraction only applies to cylinders.
    pub fn cylinder_radius(&self) -> Option<f64> {
        match self {
            Self::Cylinder { radius } => Some(*radius),
            _ => None,
        }
    }

    /// Maximum distance from the reference still inside the zone.
    fn outer_radius(&self) -> f64 {
        match self {
            Self::Cylinder { radius } => *radius,
            Self::Line { length } => length / 2.0,
            Self::FaiSector { radius } => *radius,
            Self::SymmetricQuadrant { radius, .. } => *radius,
            Self::Keyhole { radius, .. } => *radius,
        }
    }

    fn sector_angle(&self) -> Option<f64> {
        match self {
            Self::Cylinder { .. } => None,
            Self::Line { .. } => Some(core::f64::consts::PI),
            Self::FaiSector { .. } => Some(QUADRANT_ANGLE),
            Self::SymmetricQuadrant { angle, .. } => Some(*angle),
            Self::Keyhole { angle, .. } => Some(*angle),
        }
    }
}

/// An observation zone: shape, reference position, and the facing
/// direction of sector shapes (recomputed from the task legs).
#[derive(Clone, Copy, Debug)]
pub struct ObservationZone {
    shape: ZoneShape,
    reference: GeoPoint,
    orientation: f64,
}

impl ObservationZone {
    pub fn new(shape: ZoneShape, reference: GeoPoint) -> Self {
        Self {
            shape,
            reference,
            orientation: 0.0,
        }
    }

    pub fn shape(&self) -> ZoneShape {
        self.shape
    }

    pub fn reference(&self) -> GeoPoint {
        self.reference
    }

    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    /// Recompute the sector facing from the neighbouring task legs:
    /// intermediates bisect the angle between the incoming and outgoing
    /// legs, a start faces away from the next point, a finish away from
    /// the previous one.
    pub fn set_legs(&mut self, previous: Option<GeoPoint>, next: Option<GeoPoint>) {
        self.orientation = match (previous, next) {
            (Some(prev), Some(next)) => half_angle(
                self.reference.bearing(&prev),
                self.reference.bearing(&next),
            ),
            (None, Some(next)) => {
                normalize_bearing(self.reference.bearing(&next) + core::f64::consts::PI)
            }
            (Some(prev), None) => {
                normalize_bearing(self.reference.bearing(&prev) + core::f64::consts::PI)
            }
            (None, None) => 0.0,
        };
    }

    pub fn contains(&self, location: &GeoPoint) -> bool {
        if !location.is_valid() {
            return false;
        }
        let distance = self.reference.distance(location);
        if distance > self.shape.outer_radius() {
            return false;
        }

        if let ZoneShape::Keyhole { inner_radius, .. } = self.shape {
            if distance <= inner_radius {
                return true;
            }
        }

        match self.shape.sector_angle() {
            None => true,
            Some(angle) => {
                // the reference itself has no defined bearing
                if distance < 1.0 {
                    return true;
                }
                let bearing = self.reference.bearing(location);
                bearing_difference(bearing, self.orientation) <= angle / 2.0 + 1e-9
            }
        }
    }

    /// Evenly sampled boundary polygon of the full zone.
    pub fn boundary(&self) -> Vec<GeoPoint, MAX_BOUNDARY_POINTS> {
        let mut out: Vec<GeoPoint, MAX_BOUNDARY_POINTS> = Vec::new();

        match self.shape {
            ZoneShape::Cylinder { radius } => {
                const N: usize = 24;
                for i in 0..N {
                    let bearing = i as f64 * (2.0 * core::f64::consts::PI / N as f64);
                    let _ = out.push(self.reference.offset(radius, bearing));
                }
            }
            ZoneShape::Line { length } => {
                let half = length / 2.0;
                let _ = out.push(
                    self.reference
                        .offset(half, self.orientation + core::f64::consts::FRAC_PI_2),
                );
                let _ = out.push(
                    self.reference
                        .offset(half, self.orientation - core::f64::consts::FRAC_PI_2),
                );
            }
            ZoneShape::FaiSector { radius } => {
                self.push_sector(&mut out, radius, QUADRANT_ANGLE, 23);
            }
            ZoneShape::SymmetricQuadrant { radius, angle } => {
                self.push_sector(&mut out, radius, angle, 23);
            }
            ZoneShape::Keyhole {
                radius,
                inner_radius,
                angle,
            } => {
                // outer arc, then the inner cylinder closing the long way round
                let a0 = self.orientation - angle / 2.0;
                for i in 0..14 {
                    let bearing = a0 + angle * i as f64 / 13.0;
                    let _ = out.push(self.reference.offset(radius, bearing));
                }
                let back = 2.0 * core::f64::consts::PI - angle;
                let a1 = self.orientation + angle / 2.0;
                for i in 1..8 {
                    let bearing = a1 + back * i as f64 / 8.0;
                    let _ = out.push(self.reference.offset(inner_radius, bearing));
                }
            }
        }

        out
    }

    fn push_sector(
        &self,
        out: &mut Vec<GeoPoint, MAX_BOUNDARY_POINTS>,
        radius: f64,
        angle: f64,
        arc_points: usize,
    ) {
        let _ = out.push(self.reference);
        let a0 = self.orientation - angle / 2.0;
        for i in 0..arc_points {
            let bearing = a0 + angle * i as f64 / (arc_points - 1) as f64;
            let _ = out.push(self.reference.offset(radius, bearing));
        }
    }

    /// True on the fix pair that crosses into the zone.
    pub fn transition_enter(&self, now: &GeoPoint, last: &GeoPoint) -> bool {
        !self.contains(last) && self.contains(now)
    }

    /// True on the fix pair that crosses out of the zone.
    pub fn transition_exit(&self, now: &GeoPoint, last: &GeoPoint) -> bool {
        self.contains(last) && !self.contains(now)
    }
}

impl PartialEq for ObservationZone {
    fn eq(&self, other: &Self) -> bool {
        // orientation is derived state
        self.shape == other.shape
            && fabs(self.reference.latitude - other.reference.latitude) < 1e-12
            && fabs(self.reference.longitude - other.reference.longitude) < 1e-12
    }
}
