//! Task configuration bags
//!
//! Plain copyable settings structs handed in by the caller. Defaults match
//! a racing task with an always-open start gate.

use crate::glide::GlideSettings;
use crate::time::RoughTimeSpan;

use super::TaskFactoryType;

/// Rules of the start gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartConstraints {
    /// Interval during which a start is scorable
    pub open_time_span: RoughTimeSpan,
    /// Score only starts made after a pilot event opened the gate
    pub score_pev: bool,
    /// Seconds between a pilot event and the gate opening
    pub pev_start_wait_time: u32,
    /// Seconds the gate stays open after a pilot event (0 = unbounded)
    pub pev_start_window: u32,
}

impl Default for StartConstraints {
    fn default() -> Self {
        Self {
            open_time_span: RoughTimeSpan::OPEN,
            score_pev: false,
            pev_start_wait_time: 0,
            pev_start_window: 0,
        }
    }
}

/// Rules of the finish.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FinishConstraints {
    /// Apply the 1000 m height-loss rule from the start altitude
    pub fai_finish: bool,
    /// Minimum finish height above the finish elevation in meters
    pub min_height: f64,
}

impl Default for FinishConstraints {
    fn default() -> Self {
        Self {
            fai_finish: false,
            min_height: 0.0,
        }
    }
}

/// Per-task settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderedTaskSettings {
    pub start_constraints: StartConstraints,
    pub finish_constraints: FinishConstraints,
    /// Minimum time for area tasks, seconds
    pub aat_min_time: u32,
    /// Subtract the start/finish ring radius from the scored distance
    /// (FAI Sporting Code Annex A 6.3.1c and 6.3.2dii)
    pub subtract_start_finish_cylinder_radius: bool,
    /// Keep the historical active-index adjustment of `remove`
    pub emulate_legacy_remove: bool,
}

impl Default for OrderedTaskSettings {
    fn default() -> Self {
        Self {
            start_constraints: StartConstraints::default(),
            finish_constraints: FinishConstraints::default(),
            aat_min_time: 0,
            subtract_start_finish_cylinder_radius: true,
            emulate_legacy_remove: true,
        }
    }
}

/// Global task behaviour handed down by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskBehaviour {
    pub task_type_default: TaskFactoryType,
    pub ordered_defaults: OrderedTaskSettings,
    /// Adjust area targets to reach the minimum time
    pub optimise_targets_range: bool,
    /// Margin over the minimum time when optimising targets, seconds
    pub optimise_targets_margin: u32,
    /// Also adjust target bearings
    pub optimise_targets_bearing: bool,
    /// Tuning applied to performance read from the polar
    pub glide: GlideSettings,
}

impl Default for TaskBehaviour {
    fn default() -> Self {
        Self {
            task_type_default: TaskFactoryType::Racing,
            ordered_defaults: OrderedTaskSettings::default(),
            optimise_targets_range: false,
            optimise_targets_margin: 300,
            optimise_targets_bearing: false,
            glide: GlideSettings::default(),
        }
    }
}
