//! Task model
//!
//! Types and state machines for a competition-style ordered task: the
//! aircraft snapshot consumed each tick, waypoints, the per-point state,
//! advance policy, events, validation, statistics, and the ordered task
//! facade itself.

pub mod advance;
pub mod events;
pub mod factory;
pub mod ordered;
pub mod point;
pub mod settings;
pub mod stats;

use heapless::String;

use crate::geo::GeoPoint;

pub use advance::{AdvanceMode, TaskAdvance};
pub use events::{NoEvents, TaskEvents};
pub use factory::{FactoryConstraints, TaskFactoryType, TaskValidationErrors};
pub use ordered::OrderedTask;
pub use point::TaskPoint;
pub use settings::{
    FinishConstraints, OrderedTaskSettings, StartConstraints, TaskBehaviour,
};
pub use stats::{LegStat, StartStats, TaskStats, TaskSummary, TaskSummaryPoint};

/// Maximum number of points in an ordered task.
pub const MAX_TASK_POINTS: usize = 13;

/// Maximum number of alternative start points.
pub const MAX_OPTIONAL_STARTS: usize = 4;

/// Waypoint name capacity.
pub const MAX_WAYPOINT_NAME: usize = 32;

/// One navigation fix as consumed by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AircraftState {
    pub location: GeoPoint,
    /// Altitude above MSL in meters
    pub altitude: f64,
    /// Ground speed in m/s
    pub ground_speed: f64,
    /// Seconds since midnight UTC; negative when unknown
    pub time: f64,
    pub flying: bool,
}

impl AircraftState {
    pub fn has_time(&self) -> bool {
        self.time >= 0.0
    }
}

impl Default for AircraftState {
    fn default() -> Self {
        Self {
            location: GeoPoint::INVALID,
            altitude: 0.0,
            ground_speed: 0.0,
            time: -1.0,
            flying: false,
        }
    }
}

/// A named turnpoint position.
#[derive(Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub name: String<MAX_WAYPOINT_NAME>,
    pub location: GeoPoint,
    /// Terrain elevation at the waypoint in meters
    pub elevation: f64,
}

impl Waypoint {
    /// Build a waypoint; over-long names are truncated.
    pub fn new(name: &str, location: GeoPoint, elevation: f64) -> Self {
        let mut stored: String<MAX_WAYPOINT_NAME> = String::new();
        for c in name.chars() {
            if stored.push(c).is_err() {
                break;
            }
        }
        Self {
            name: stored,
            location,
            elevation,
        }
    }
}

/// Scoring behaviour of an intermediate point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntermediateKind {
    /// Area turnpoint: the pilot picks the route through it
    Aat,
    /// Racing turnpoint: a fixed rounding
    Racing,
}

/// Position role of a task point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskPointKind {
    Start,
    Intermediate(IntermediateKind),
    Finish,
}

impl TaskPointKind {
    /// May a point of this kind have a predecessor?
    pub fn is_predecessor_allowed(&self) -> bool {
        !matches!(self, Self::Start)
    }

    /// May a point of this kind have a successor?
    pub fn is_successor_allowed(&self) -> bool {
        !matches!(self, Self::Finish)
    }

    pub fn is_area(&self) -> bool {
        matches!(self, Self::Intermediate(IntermediateKind::Aat))
    }
}

/// Relation of a point to the active index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveState {
    BeforeActive,
    CurrentActive,
    AfterActive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aircraft_state_default_invalid() {
        let state = AircraftState::default();
        assert!(!state.location.is_valid());
        assert!(!state.has_time());
        assert!(!state.flying);
    }

    #[test]
    fn test_waypoint_name_truncation() {
        let long = "a-very-long-waypoint-name-that-exceeds-the-name-capacity";
        let wp = Waypoint::new(long, GeoPoint::from_degrees(45.0, 7.0), 400.0);
        assert_eq!(wp.name.len(), MAX_WAYPOINT_NAME);
    }

    #[test]
    fn test_kind_ordering_rules() {
        assert!(!TaskPointKind::Start.is_predecessor_allowed());
        assert!(TaskPointKind::Start.is_successor_allowed());
        assert!(TaskPointKind::Finish.is_predecessor_allowed());
        assert!(!TaskPointKind::Finish.is_successor_allowed());

        let racing = TaskPointKind::Intermediate(IntermediateKind::Racing);
        assert!(racing.is_predecessor_allowed());
        assert!(racing.is_successor_allowed());
        assert!(!racing.is_area());
        assert!(TaskPointKind::Intermediate(IntermediateKind::Aat).is_area());
    }
}
