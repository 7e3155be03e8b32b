//! Task statistics
//!
//! Snapshot data published to collaborators after every update. All types
//! are plain and copyable so a renderer can take them across a lock cheaply.

use heapless::Vec;

use crate::geo::GeoBounds;

use super::{AircraftState, MAX_TASK_POINTS};

/// Start point statistics, valid once `has_started()` is true.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartStats {
    /// Seconds of day when the task was started; negative when not started
    pub time: f64,
    /// Altitude when the task was started, m MSL
    pub altitude: f64,
    /// Ground speed when the task was started, m/s
    pub ground_speed: f64,
    /// The start was advanced by a pilot event
    pub advanced_by_pev: bool,
}

impl StartStats {
    pub fn reset(&mut self) {
        self.time = -1.0;
        self.advanced_by_pev = false;
    }

    pub fn has_started(&self) -> bool {
        self.time >= 0.0
    }

    pub fn started_time(&self) -> f64 {
        self.time
    }

    /// Latch the start from the aircraft snapshot at the scoring transition.
    pub fn set_started(&mut self, aircraft: &AircraftState, advanced_by_pev: bool) {
        self.time = aircraft.time;
        self.altitude = aircraft.altitude;
        self.ground_speed = aircraft.ground_speed;
        self.advanced_by_pev = advanced_by_pev;
    }
}

impl Default for StartStats {
    fn default() -> Self {
        Self {
            time: -1.0,
            altitude: 0.0,
            ground_speed: 0.0,
            advanced_by_pev: false,
        }
    }
}

/// Distance/time aggregate for the whole task or for one leg.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LegStat {
    /// Planned distance in meters
    pub planned: f64,
    /// Achieved distance in meters
    pub travelled: f64,
    /// Distance still to fly in meters
    pub remaining: f64,
    /// Estimated seconds to finish at the current polar performance
    pub time_remaining: f64,
}

impl LegStat {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Aggregate statistics of an ordered task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskStats {
    /// Geographic extent of the task including zone boundaries
    pub bounds: GeoBounds,
    pub task_valid: bool,
    pub has_targets: bool,
    pub is_mat: bool,
    pub task_finished: bool,
    /// The aircraft is inside the active observation zone
    pub inside_oz: bool,
    /// The advance state machine waits for the pilot to arm
    pub need_to_arm: bool,
    /// A pilot event has opened the gate and the start may be scored
    pub pev_based_advance_ready: bool,
    pub start: StartStats,
    pub total: LegStat,
    pub current_leg: LegStat,
    /// Center-to-center task distance, rings subtracted, meters
    pub distance_nominal: f64,
    /// Maximum achievable distance over the remaining boundaries, meters
    pub distance_max: f64,
    /// Maximum achievable distance ignoring flown history, meters
    pub distance_max_total: f64,
}

impl Default for TaskStats {
    fn default() -> Self {
        Self {
            bounds: GeoBounds::INVALID,
            task_valid: false,
            has_targets: false,
            is_mat: false,
            task_finished: false,
            inside_oz: false,
            need_to_arm: false,
            pev_based_advance_ready: false,
            start: StartStats::default(),
            total: LegStat::default(),
            current_leg: LegStat::default(),
            distance_nominal: 0.0,
            distance_max: 0.0,
            distance_max_total: 0.0,
        }
    }
}

/// One row of the per-point task summary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TaskSummaryPoint {
    /// Planned distance of the leg arriving at this point, meters
    pub planned_distance: f64,
    /// The point has been rounded (start: exited; others: sampled)
    pub achieved: bool,
}

/// Compact per-point view for external display.
#[derive(Clone, Debug, Default)]
pub struct TaskSummary {
    pub active: usize,
    pub points: Vec<TaskSummaryPoint, MAX_TASK_POINTS>,
}

impl TaskSummary {
    pub fn clear(&mut self) {
        self.active = 0;
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    #[test]
    fn test_start_stats_latch() {
        let mut stats = StartStats::default();
        assert!(!stats.has_started());

        let aircraft = AircraftState {
            location: GeoPoint::from_degrees(45.0, 7.0),
            altitude: 1000.0,
            ground_speed: 30.0,
            time: 100.0,
            flying: true,
        };
        stats.set_started(&aircraft, false);
        assert!(stats.has_started());
        assert_eq!(stats.time, 100.0);
        assert_eq!(stats.altitude, 1000.0);
        assert_eq!(stats.ground_speed, 30.0);
        assert!(!stats.advanced_by_pev);

        stats.reset();
        assert!(!stats.has_started());
    }

    #[test]
    fn test_task_stats_default() {
        let stats = TaskStats::default();
        assert!(!stats.bounds.is_valid());
        assert!(!stats.task_valid);
        assert!(!stats.task_finished);
        assert_eq!(stats.distance_nominal, 0.0);
    }
}
